use clap::Parser;
use sra_cli::{Cli, Commands};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }

    let result = match &cli.command {
        Commands::Run(args) => {
            info!(system = %args.system.display(), "running reliability study");
            commands::run::handle(args)
        }
        Commands::Validate { system } => commands::validate::handle(system),
        Commands::Matrices { system } => commands::matrices::handle(system),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
