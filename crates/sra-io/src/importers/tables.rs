//! Row records for the per-asset CSV tables.
//!
//! Column names follow the headers used by existing study data sets; each
//! field also accepts a snake_case alias.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sra_core::{
    Branch, BranchId, Bus, BusId, DeratingModel, FailureModel, Gen, GenId, Storage, StorageId,
};
use std::path::Path;

#[derive(Debug, Deserialize)]
pub(crate) struct BusRecord {
    #[serde(rename = "Bus Name", alias = "name")]
    name: String,
    #[serde(rename = "Bus No.", alias = "bus")]
    number: usize,
    #[serde(rename = "Zone", alias = "zone", default)]
    zone: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRecord {
    #[serde(rename = "From Bus", alias = "from_bus")]
    from_bus: usize,
    #[serde(rename = "To Bus", alias = "to_bus")]
    to_bus: usize,
    #[serde(rename = "R", alias = "resistance", default)]
    resistance: Option<f64>,
    #[serde(rename = "X", alias = "reactance", default)]
    reactance: Option<f64>,
    #[serde(rename = "B", alias = "charging", default)]
    charging: Option<f64>,
    #[serde(rename = "Rating", alias = "rating_mw")]
    rating: f64,
    #[serde(rename = "MTTF", alias = "mttf_hours", default)]
    mttf: Option<f64>,
    #[serde(rename = "MTTR", alias = "mttr_hours", default)]
    mttr: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenRecord {
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "Bus No.", alias = "bus")]
    bus: usize,
    #[serde(rename = "Max Cap", alias = "pmax_mw")]
    pmax: f64,
    #[serde(rename = "Min Cap", alias = "pmin_mw", default)]
    pmin: Option<f64>,
    #[serde(rename = "FOR", alias = "forced_outage_rate", default)]
    forced_outage_rate: Option<f64>,
    #[serde(rename = "MTTF", alias = "mttf_hours", default)]
    mttf: Option<f64>,
    #[serde(rename = "MTTR", alias = "mttr_hours", default)]
    mttr: Option<f64>,
    #[serde(rename = "Cost", alias = "cost", default)]
    cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StorageRecord {
    #[serde(rename = "Name", alias = "name")]
    name: String,
    #[serde(rename = "Bus", alias = "bus")]
    bus: usize,
    #[serde(rename = "Pmax", alias = "pmax_mw")]
    pmax: f64,
    #[serde(rename = "Pmin", alias = "pmin_mw", default)]
    pmin: Option<f64>,
    #[serde(rename = "Duration", alias = "duration_hours")]
    duration: f64,
    #[serde(rename = "max_SOC", alias = "soc_max", default)]
    soc_max: Option<f64>,
    #[serde(rename = "min_SOC", alias = "soc_min", default)]
    soc_min: Option<f64>,
    /// Round-trip efficiency
    #[serde(rename = "Efficiency", alias = "efficiency", default)]
    efficiency: Option<f64>,
    #[serde(rename = "Discharge Cost", alias = "discharge_cost", default)]
    discharge_cost: Option<f64>,
    #[serde(rename = "Charge Cost", alias = "charge_cost", default)]
    charge_cost: Option<f64>,
    #[serde(rename = "MTTF", alias = "mttf_hours", default)]
    mttf: Option<f64>,
    #[serde(rename = "MTTR", alias = "mttr_hours", default)]
    mttr: Option<f64>,
    #[serde(rename = "Units", alias = "units", default)]
    units: Option<u32>,
}

/// Entry of `derating.json`: generator row (1-based) plus its multi-state model.
#[derive(Debug, Deserialize)]
pub(crate) struct DeratingRecord {
    pub(crate) generator: usize,
    #[serde(flatten)]
    pub(crate) model: DeratingModel,
}

/// A blank or infinite MTTF means the asset never fails; any other MTTF needs
/// an MTTR alongside it.
fn failure_model(mttf: Option<f64>, mttr: Option<f64>) -> Result<FailureModel> {
    match (mttf, mttr) {
        (None, _) => Ok(FailureModel::never_fails()),
        (Some(mttf), None) if mttf.is_infinite() => Ok(FailureModel::never_fails()),
        (Some(mttf), Some(mttr)) => Ok(FailureModel::new(mttf, mttr)),
        (Some(mttf), None) => bail!("MTTF is {mttf} h but MTTR is missing"),
    }
}

/// Deserialize every row of a headed CSV table.
pub(crate) fn read_table<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {what} table '{}'", path.display()))?;
    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize().enumerate() {
        // header is line 1
        let record: T = result
            .with_context(|| format!("parsing {what} record at line {}", idx + 2))?;
        rows.push(record);
    }
    Ok(rows)
}

impl From<BusRecord> for Bus {
    fn from(record: BusRecord) -> Self {
        let bus = Bus::new(BusId::new(record.number), record.name);
        match record.zone {
            Some(zone) => bus.with_zone(zone),
            None => bus,
        }
    }
}

impl BranchRecord {
    pub(crate) fn into_branch(self, row: usize) -> Result<Branch> {
        let reliability = failure_model(self.mttf, self.mttr)
            .with_context(|| format!("branch row {}", row + 1))?;
        Ok(Branch::new(
            BranchId::new(row + 1),
            format!("{}-{}", self.from_bus, self.to_bus),
            BusId::new(self.from_bus),
            BusId::new(self.to_bus),
            self.rating,
        )
        .with_impedance(
            self.resistance.unwrap_or(0.0),
            self.reactance.unwrap_or(0.0),
            self.charging.unwrap_or(0.0),
        )
        .with_reliability(reliability))
    }
}

impl GenRecord {
    pub(crate) fn into_gen(self, row: usize) -> Result<Gen> {
        let reliability = failure_model(self.mttf, self.mttr)
            .with_context(|| format!("generator row {}", row + 1))?;
        let name = self.name.unwrap_or_else(|| format!("G{}", row + 1));
        let mut gen = Gen::new(GenId::new(row + 1), name, BusId::new(self.bus))
            .with_p_limits(self.pmin.unwrap_or(0.0), self.pmax)
            .with_cost(self.cost.unwrap_or(0.0))
            .with_reliability(reliability);
        gen.forced_outage_rate = self.forced_outage_rate;
        Ok(gen)
    }
}

impl StorageRecord {
    pub(crate) fn into_storage(self, row: usize) -> Result<Storage> {
        let reliability = failure_model(self.mttf, self.mttr)
            .with_context(|| format!("storage row {}", row + 1))?;
        let mut ess = Storage::new(
            StorageId::new(row + 1),
            self.name,
            BusId::new(self.bus),
            self.pmax,
            self.duration,
        )
        .with_soc_limits(self.soc_min.unwrap_or(0.0), self.soc_max.unwrap_or(1.0))
        .with_round_trip_efficiency(self.efficiency.unwrap_or(1.0))
        .with_costs(
            self.charge_cost.unwrap_or(0.0),
            self.discharge_cost.unwrap_or(0.0),
        )
        .with_reliability(reliability)
        .with_units(self.units.unwrap_or(1));
        ess.pmin = sra_core::Megawatts(self.pmin.unwrap_or(0.0));
        Ok(ess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_mttf_never_fails() {
        let model = failure_model(None, Some(10.0)).unwrap();
        assert_eq!(model.failure_rate(), 0.0);
        let model = failure_model(Some(f64::INFINITY), None).unwrap();
        assert_eq!(model.failure_rate(), 0.0);
    }

    #[test]
    fn test_finite_mttf_requires_mttr() {
        let err = failure_model(Some(100.0), None).unwrap_err();
        assert!(err.to_string().contains("MTTR is missing"));
        let model = failure_model(Some(100.0), Some(4.0)).unwrap();
        assert!((model.repair_rate() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_storage_record_splits_efficiency() {
        let record = StorageRecord {
            name: "ESS".into(),
            bus: 2,
            pmax: 10.0,
            pmin: None,
            duration: 4.0,
            soc_max: Some(0.9),
            soc_min: Some(0.1),
            efficiency: Some(0.64),
            discharge_cost: Some(30.0),
            charge_cost: Some(-5.0),
            mttf: Some(500.0),
            mttr: Some(5.0),
            units: Some(4),
        };
        let ess = record.into_storage(0).unwrap();
        assert_eq!(ess.id, StorageId::new(1));
        assert!((ess.charge_efficiency - 0.8).abs() < 1e-12);
        assert_eq!(ess.units, 4);
        assert_eq!(ess.charge_cost, -5.0);
    }
}
