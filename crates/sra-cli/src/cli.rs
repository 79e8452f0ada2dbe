use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use sra_algo::DispatchMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sra",
    author,
    version,
    about = "Sequential Monte Carlo reliability assessment",
    long_about = None
)]
pub struct Cli {
    /// Set the logging level (overridden by RUST_LOG when set)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Monte Carlo reliability study
    Run(RunArgs),
    /// Check a system directory and print diagnostics
    Validate {
        /// Directory holding bus.csv, gen.csv, load.csv, ...
        #[arg(long, value_hint = ValueHint::DirPath)]
        system: PathBuf,
    },
    /// Print study matrix dimensions and non-zero counts
    Matrices {
        #[arg(long, value_hint = ValueHint::DirPath)]
        system: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory holding bus.csv, gen.csv, load.csv, ...
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub system: PathBuf,

    /// Renewable availability scenario CSV; repeat for more scenarios
    #[arg(long, num_args = 1.., value_hint = ValueHint::FilePath)]
    pub renewables: Vec<PathBuf>,

    /// Study configuration TOML; flags override its values
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Number of trials
    #[arg(long)]
    pub trials: Option<usize>,

    /// Hours per trial
    #[arg(long)]
    pub hours: Option<usize>,

    /// Worker threads, or "auto" for one per CPU
    #[arg(long)]
    pub workers: Option<String>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Dispatch formulation
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Write indices as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,

    /// Write the outage event log as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub events: Option<PathBuf>,

    /// Write the month × hour outage heat map as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub heatmap: Option<PathBuf>,

    /// Write per-bus EUE and LOLH as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub buses: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Nodal balance with branch limits
    Full,
    /// Single copper-plate balance
    Lite,
}

impl From<ModeArg> for DispatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => DispatchMode::Full,
            ModeArg::Lite => DispatchMode::Lite,
        }
    }
}
