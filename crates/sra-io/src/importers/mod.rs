//! Loaders for the system directory and the bus-indexed hourly series.

mod tables;

use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use sra_core::{Bus, BusSeries, Network};
use std::path::Path;
use tables::{BranchRecord, BusRecord, DeratingRecord, GenRecord, StorageRecord};
use tracing::{debug, info};

pub const BUS_FILE: &str = "bus.csv";
pub const BRANCH_FILE: &str = "branch.csv";
pub const GEN_FILE: &str = "gen.csv";
pub const STORAGE_FILE: &str = "storage.csv";
pub const LOAD_FILE: &str = "load.csv";
pub const DERATING_FILE: &str = "derating.json";

/// Column headers that index rows rather than name a bus.
const INDEX_COLUMNS: &[&str] = &["hour", "time", "timestamp", "datetime", "date"];

/// Load a complete system description from a directory of CSV tables.
///
/// The returned network is not validated; call [`Network::validate`] or
/// [`Network::ensure_valid`] before simulating.
pub fn load_system(dir: impl AsRef<Path>) -> Result<Network> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!("system directory '{}' does not exist", dir.display());
    }

    let buses: Vec<Bus> = tables::read_table::<BusRecord>(&dir.join(BUS_FILE), "bus")?
        .into_iter()
        .map(Bus::from)
        .collect();
    if buses.is_empty() {
        bail!("'{}' lists no buses", dir.join(BUS_FILE).display());
    }

    let load = load_bus_series(dir.join(LOAD_FILE), &buses)
        .context("loading hourly demand")?;
    let mut network = Network::new(buses, load);

    let branch_path = dir.join(BRANCH_FILE);
    if branch_path.exists() {
        for (row, record) in tables::read_table::<BranchRecord>(&branch_path, "branch")?
            .into_iter()
            .enumerate()
        {
            network.add_branch(record.into_branch(row)?);
        }
    }

    for (row, record) in tables::read_table::<GenRecord>(&dir.join(GEN_FILE), "generator")?
        .into_iter()
        .enumerate()
    {
        network.add_generator(record.into_gen(row)?);
    }

    let storage_path = dir.join(STORAGE_FILE);
    if storage_path.exists() {
        for (row, record) in tables::read_table::<StorageRecord>(&storage_path, "storage")?
            .into_iter()
            .enumerate()
        {
            network.add_storage(record.into_storage(row)?);
        }
    }

    let derating_path = dir.join(DERATING_FILE);
    if derating_path.exists() {
        apply_derating(&mut network, &derating_path)?;
    }

    info!(
        dir = %dir.display(),
        stats = %network.stats(),
        "loaded system"
    );
    Ok(network)
}

fn apply_derating(network: &mut Network, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading derating models '{}'", path.display()))?;
    let records: Vec<DeratingRecord> = serde_json::from_str(&text)
        .with_context(|| format!("parsing derating models '{}'", path.display()))?;
    for record in records {
        let count = network.generators.len();
        let gen = record
            .generator
            .checked_sub(1)
            .and_then(|idx| network.generators.get_mut(idx))
            .ok_or_else(|| {
                anyhow!(
                    "derating model refers to generator {} but only {count} are defined",
                    record.generator
                )
            })?;
        debug!(generator = %gen.id, states = record.model.num_states(), "multi-state model");
        gen.derating = Some(record.model);
    }
    Ok(())
}

/// Read a wide hourly table (one column per bus, one row per hour) into a
/// series aligned with `buses`.
///
/// Columns are matched to buses by name, falling back to the bus number.
/// Buses without a column get zeros; blank cells read as zero. An index
/// column such as `Hour` is skipped.
pub fn load_bus_series(path: impl AsRef<Path>, buses: &[Bus]) -> Result<BusSeries> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening series '{}'", path.display()))?;

    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of '{}'", path.display()))?
        .clone();
    let mut columns: Vec<(usize, usize)> = Vec::new();
    for (col, header) in headers.iter().enumerate() {
        if INDEX_COLUMNS.contains(&header.to_ascii_lowercase().as_str()) {
            continue;
        }
        let position = buses
            .iter()
            .position(|bus| bus.name == header)
            .or_else(|| {
                header
                    .parse::<usize>()
                    .ok()
                    .and_then(|number| buses.iter().position(|bus| bus.id.value() == number))
            })
            .ok_or_else(|| {
                anyhow!(
                    "column '{header}' in '{}' does not match any bus",
                    path.display()
                )
            })?;
        columns.push((col, position));
    }

    let mut rows = Vec::new();
    for (hour, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("reading hour {hour}"))?;
        let mut row = vec![0.0; buses.len()];
        for &(col, position) in &columns {
            let cell = record.get(col).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            row[position] = cell.parse::<f64>().with_context(|| {
                format!(
                    "hour {hour}, column '{}': '{cell}' is not a number",
                    &headers[col]
                )
            })?;
        }
        rows.push(row);
    }

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    BusSeries::new(name, buses.len(), rows).map_err(|err| anyhow!("{}: {err}", path.display()))
}
