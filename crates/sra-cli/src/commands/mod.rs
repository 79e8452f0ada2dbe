pub mod matrices;
pub mod run;
pub mod validate;
