pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, ModeArg, RunArgs};
