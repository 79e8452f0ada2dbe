use anyhow::{Context, Result};
use serde::Serialize;
use sra_algo::indices::MONTH_NAMES;
use sra_algo::{build_matrices, monte_carlo, BusIndices, ReliabilityIndices, StudyConfig, StudyResult};
use sra_cli::cli::RunArgs;
use sra_cli::config;
use sra_io::importers::{load_bus_series, load_system};
use sra_io::{write_json, write_matrix_csv, write_records_csv};
use std::io::{self, Write};
use tabwriter::TabWriter;
use tracing::{info, warn};

#[derive(Serialize)]
struct Report<'a> {
    system: String,
    renewable_scenarios: usize,
    config: &'a StudyConfig,
    indices: &'a ReliabilityIndices,
    buses: &'a [BusIndices],
    converged: Option<bool>,
    elapsed_secs: f64,
}

pub fn handle(args: &RunArgs) -> Result<()> {
    let config = config::resolve(args)?;
    let mut network = load_system(&args.system)?;
    for path in &args.renewables {
        let scenario = load_bus_series(path, &network.buses)
            .with_context(|| format!("loading renewable scenario '{}'", path.display()))?;
        network.add_renewable_scenario(scenario);
    }
    let matrices = build_matrices(&network)
        .with_context(|| format!("building study matrices for '{}'", args.system.display()))?;

    let result = monte_carlo::run(&network, &matrices, &config)?;
    print_summary(&result)?;

    if let Some(path) = &args.out {
        let report = Report {
            system: args.system.display().to_string(),
            renewable_scenarios: network.renewables.len(),
            config: &config,
            indices: &result.indices,
            buses: &result.buses,
            converged: result.converged,
            elapsed_secs: result.elapsed_secs,
        };
        write_json(path, &report)?;
        info!(path = %path.display(), "wrote indices");
    }
    if let Some(path) = &args.events {
        write_records_csv(path, &result.events)?;
        info!(path = %path.display(), events = result.events.len(), "wrote event log");
    }
    if let Some(path) = &args.buses {
        write_records_csv(path, &result.buses)?;
        info!(path = %path.display(), "wrote bus indices");
    }
    if let Some(path) = &args.heatmap {
        match &result.heat_map {
            Some(map) => {
                let hours: Vec<String> = (0..24).map(|h| h.to_string()).collect();
                let months: Vec<String> = MONTH_NAMES.iter().map(|m| m.to_string()).collect();
                write_matrix_csv(path, "month", &hours, &months, &map.values)?;
                info!(path = %path.display(), "wrote outage heat map");
            }
            None => warn!(
                horizon = config.horizon_hours,
                "heat map needs 24-hour days and a whole number of days; skipped"
            ),
        }
    }
    Ok(())
}

fn print_summary(result: &StudyResult) -> Result<()> {
    let indices = &result.indices;
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "INDEX\tVALUE\tUNIT")?;
    let rows = [
        ("LOLP", indices.lolp, ""),
        ("LOLE", indices.lole, "h/period"),
        ("LOLE (annual)", indices.lole_annual, "h/yr"),
        ("LOLE (days)", indices.lole_days, "d/period"),
        ("LOLF", indices.lolf, "events/period"),
        ("EUE", indices.eue, "MWh/period"),
        ("EPNS", indices.epns, "MW"),
        ("MDT", indices.mdt, "h"),
    ];
    for (name, value, unit) in rows {
        writeln!(writer, "{name}\t{value:.6}\t{unit}")?;
    }
    writer.flush()?;

    println!(
        "{} trials x {} h, LOLE std error {:.4}, COV {}",
        indices.trials,
        indices.horizon_hours,
        indices.lolh_std_error,
        indices
            .lolh_cov
            .map_or_else(|| "n/a".to_string(), |c| format!("{c:.4}"))
    );
    if let Some(converged) = result.converged {
        println!("Convergence target met: {converged}");
    }
    Ok(())
}
