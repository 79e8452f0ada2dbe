//! # sra-core: Network Registry for Sequential Reliability Assessment
//!
//! Provides the immutable, per-study description of a power system that the
//! Monte Carlo engine in `sra-algo` simulates: buses, branches, generators,
//! storage units, hourly load and renewable series, and the reliability
//! parameters (MTTF/MTTR, derating ladders) of every failable asset.
//!
//! ## Design Philosophy
//!
//! The registry is **tabular**: each asset class is a `Vec` indexed by position,
//! and positions are what the matrix builder and the state engine use as
//! column indices. Buses are referenced by their external [`BusId`] (the bus
//! number in the source tables) and resolved to positions once per study.
//!
//! Nothing in this crate is mutated during a simulation. Per-trial state
//! (component up/down status, storage state of charge) lives in `sra-algo`.
//!
//! ## Quick Start
//!
//! ```rust
//! use sra_core::*;
//!
//! let buses = vec![Bus::new(BusId::new(1), "North"), Bus::new(BusId::new(2), "South")];
//! let load = BusSeries::constant("load", vec![0.0, 80.0], 24);
//! let mut network = Network::new(buses, load);
//!
//! network.add_generator(
//!     Gen::new(GenId::new(1), "Coal 1", BusId::new(1))
//!         .with_p_limits(0.0, 120.0)
//!         .with_cost(20.0)
//!         .with_reliability(FailureModel::new(1100.0, 50.0)),
//! );
//! network.add_branch(
//!     Branch::new(BranchId::new(1), "N-S", BusId::new(1), BusId::new(2), 100.0)
//!         .with_reliability(FailureModel::new(4000.0, 12.0)),
//! );
//!
//! assert!(network.ensure_valid().is_ok());
//! ```
//!
//! ## Modules
//!
//! - [`network`] - The [`Network`] registry and its validation
//! - [`series`] - Bus-indexed hourly time series (load, renewables)
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`graph_utils`] - Topological analysis (islands)
//! - [`units`] - MW / MWh / hour newtypes

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod network;
pub mod series;
pub mod units;

pub use diagnostics::{Category, DiagnosticIssue, Diagnostics, Severity};
pub use error::{SraError, SraResult};
pub use graph_utils::{bus_graph, find_islands, island_count, Island};
pub use network::{Network, NetworkStats};
pub use series::BusSeries;
pub use units::{Hours, MegawattHours, Megawatts};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(usize);

macro_rules! impl_id {
    ($type:ident, $label:literal) => {
        impl $type {
            #[inline]
            pub fn new(value: usize) -> Self {
                $type(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

impl_id!(BusId, "Bus");
impl_id!(BranchId, "Branch");
impl_id!(GenId, "Gen");
impl_id!(StorageId, "ESS");

/// Exponential failure/repair parameters of a two-state component.
///
/// `mttf` may be infinite, meaning the component never fails. Both times must
/// otherwise be strictly positive; [`FailureModel::check`] enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailureModel {
    /// Mean time to failure
    pub mttf: Hours,
    /// Mean time to repair
    pub mttr: Hours,
}

impl FailureModel {
    pub fn new(mttf_hours: f64, mttr_hours: f64) -> Self {
        Self {
            mttf: Hours(mttf_hours),
            mttr: Hours(mttr_hours),
        }
    }

    /// A component that never leaves the Up state.
    pub fn never_fails() -> Self {
        Self::new(f64::INFINITY, 1.0)
    }

    /// λ = 1/MTTF (per hour)
    pub fn failure_rate(&self) -> f64 {
        self.mttf.as_rate()
    }

    /// μ = 1/MTTR (per hour)
    pub fn repair_rate(&self) -> f64 {
        self.mttr.as_rate()
    }

    /// Long-run fraction of time spent Down: MTTR / (MTTF + MTTR).
    pub fn unavailability(&self) -> f64 {
        if self.mttf.value().is_infinite() {
            0.0
        } else {
            self.mttr.value() / (self.mttf.value() + self.mttr.value())
        }
    }

    /// Reject non-positive or NaN mean times.
    pub fn check(&self) -> Result<(), String> {
        let mttf = self.mttf.value();
        let mttr = self.mttr.value();
        if mttf.is_nan() || mttf <= 0.0 {
            return Err(format!("MTTF must be positive, got {mttf}"));
        }
        if !mttr.is_finite() || mttr <= 0.0 {
            return Err(format!("MTTR must be positive and finite, got {mttr}"));
        }
        Ok(())
    }
}

impl Default for FailureModel {
    fn default() -> Self {
        Self::never_fails()
    }
}

/// Multi-state (derated) outage model for a generator.
///
/// States are ordered `[Up, Derated(0), .., Derated(n-1), Down]`. `levels[k]` is
/// the available capacity fraction in `Derated(k)`; Up is 1.0 and Down is 0.0.
/// `rates[i][j]` is the transition rate from state `i` to state `j` in 1/h; the
/// diagonal is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeratingModel {
    pub levels: Vec<f64>,
    pub rates: Vec<Vec<f64>>,
}

impl DeratingModel {
    pub fn new(levels: Vec<f64>, rates: Vec<Vec<f64>>) -> Self {
        Self { levels, rates }
    }

    pub fn num_states(&self) -> usize {
        self.levels.len() + 2
    }

    pub fn check(&self) -> Result<(), String> {
        let n = self.num_states();
        if let Some(level) = self.levels.iter().find(|l| !(**l > 0.0 && **l < 1.0)) {
            return Err(format!(
                "derated capacity fractions must lie strictly between 0 and 1, got {level}"
            ));
        }
        if self.rates.len() != n || self.rates.iter().any(|row| row.len() != n) {
            return Err(format!("derating rate matrix must be {n}x{n}"));
        }
        for (i, row) in self.rates.iter().enumerate() {
            for (j, rate) in row.iter().enumerate() {
                if i != j && (!rate.is_finite() || *rate < 0.0) {
                    return Err(format!(
                        "derating rate {i}->{j} must be finite and non-negative, got {rate}"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub zone: Option<i64>,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            zone: None,
        }
    }

    pub fn with_zone(mut self, zone: i64) -> Self {
        self.zone = Some(zone);
        self
    }
}

/// Transmission corridor between two buses (transportation model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Symmetric transfer limit
    pub rating: Megawatts,
    pub reliability: FailureModel,
    /// Series resistance (per-unit), carried for reporting only
    pub resistance: f64,
    /// Series reactance (per-unit), carried for reporting only
    pub reactance: f64,
    /// Line charging susceptance (per-unit), carried for reporting only
    pub charging_b: f64,
}

impl Branch {
    pub fn new(
        id: BranchId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        rating_mw: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            rating: Megawatts(rating_mw),
            reliability: FailureModel::never_fails(),
            resistance: 0.0,
            reactance: 0.0,
            charging_b: 0.0,
        }
    }

    pub fn with_reliability(mut self, reliability: FailureModel) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_impedance(mut self, resistance: f64, reactance: f64, charging_b: f64) -> Self {
        self.resistance = resistance;
        self.reactance = reactance;
        self.charging_b = charging_b;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    pub pmin: Megawatts,
    /// Nameplate rating
    pub pmax: Megawatts,
    /// Linear generation cost ($/MWh)
    pub cost: f64,
    /// Forced outage rate from the source data (informational)
    pub forced_outage_rate: Option<f64>,
    pub reliability: FailureModel,
    /// Replaces the two-state model when present
    pub derating: Option<DeratingModel>,
}

impl Gen {
    pub fn new(id: GenId, name: impl Into<String>, bus: BusId) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            pmin: Megawatts(0.0),
            pmax: Megawatts(0.0),
            cost: 0.0,
            forced_outage_rate: None,
            reliability: FailureModel::never_fails(),
            derating: None,
        }
    }

    /// Set active power limits (in MW)
    pub fn with_p_limits(mut self, pmin: f64, pmax: f64) -> Self {
        self.pmin = Megawatts(pmin);
        self.pmax = Megawatts(pmax);
        self
    }

    pub fn with_cost(mut self, cost_per_mwh: f64) -> Self {
        self.cost = cost_per_mwh;
        self
    }

    pub fn with_reliability(mut self, reliability: FailureModel) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_derating(mut self, derating: DeratingModel) -> Self {
        self.derating = Some(derating);
        self
    }
}

/// Energy storage system (ESS), possibly made of several identical sub-units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    pub id: StorageId,
    pub name: String,
    pub bus: BusId,
    pub pmin: Megawatts,
    /// Rated charge/discharge power
    pub pmax: Megawatts,
    /// Hours of discharge at rated power
    pub duration: Hours,
    /// Minimum state of charge as a fraction of energy capacity
    pub soc_min: f64,
    /// Maximum state of charge as a fraction of energy capacity
    pub soc_max: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    /// $/MWh charged (negative values encourage charging)
    pub charge_cost: f64,
    /// $/MWh discharged
    pub discharge_cost: f64,
    /// Failure parameters of one sub-unit
    pub reliability: FailureModel,
    /// Number of identical sub-units sharing the rating
    pub units: u32,
}

impl Storage {
    pub fn new(
        id: StorageId,
        name: impl Into<String>,
        bus: BusId,
        pmax_mw: f64,
        duration_hours: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            pmin: Megawatts(0.0),
            pmax: Megawatts(pmax_mw),
            duration: Hours(duration_hours),
            soc_min: 0.0,
            soc_max: 1.0,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            charge_cost: 0.0,
            discharge_cost: 0.0,
            reliability: FailureModel::never_fails(),
            units: 1,
        }
    }

    pub fn with_soc_limits(mut self, soc_min: f64, soc_max: f64) -> Self {
        self.soc_min = soc_min;
        self.soc_max = soc_max;
        self
    }

    /// Split a round-trip efficiency evenly between charging and discharging.
    pub fn with_round_trip_efficiency(mut self, efficiency: f64) -> Self {
        let one_way = efficiency.sqrt();
        self.charge_efficiency = one_way;
        self.discharge_efficiency = one_way;
        self
    }

    pub fn with_costs(mut self, charge_cost: f64, discharge_cost: f64) -> Self {
        self.charge_cost = charge_cost;
        self.discharge_cost = discharge_cost;
        self
    }

    pub fn with_reliability(mut self, reliability: FailureModel) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }

    /// Energy capacity at full availability
    pub fn energy_capacity(&self) -> MegawattHours {
        self.pmax * self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_model_rates() {
        let model = FailureModel::new(100.0, 10.0);
        assert!((model.failure_rate() - 0.01).abs() < 1e-15);
        assert!((model.repair_rate() - 0.1).abs() < 1e-15);
        assert!((model.unavailability() - 10.0 / 110.0).abs() < 1e-15);
        assert!(model.check().is_ok());
    }

    #[test]
    fn test_never_fails_model() {
        let model = FailureModel::never_fails();
        assert_eq!(model.failure_rate(), 0.0);
        assert_eq!(model.unavailability(), 0.0);
        assert!(model.check().is_ok());
    }

    #[test]
    fn test_failure_model_rejects_non_positive_times() {
        assert!(FailureModel::new(0.0, 10.0).check().is_err());
        assert!(FailureModel::new(-5.0, 10.0).check().is_err());
        assert!(FailureModel::new(100.0, 0.0).check().is_err());
        assert!(FailureModel::new(f64::NAN, 10.0).check().is_err());
        assert!(FailureModel::new(100.0, f64::INFINITY).check().is_err());
    }

    #[test]
    fn test_derating_model_shape_checks() {
        let ok = DeratingModel::new(
            vec![0.5],
            vec![
                vec![0.0, 0.01, 0.002],
                vec![0.1, 0.0, 0.01],
                vec![0.05, 0.0, 0.0],
            ],
        );
        assert_eq!(ok.num_states(), 3);
        assert!(ok.check().is_ok());

        let bad_shape = DeratingModel::new(vec![0.5], vec![vec![0.0; 2]; 2]);
        assert!(bad_shape.check().is_err());

        let bad_level = DeratingModel::new(vec![1.0], vec![vec![0.0; 3]; 3]);
        assert!(bad_level.check().is_err());
    }

    #[test]
    fn test_storage_energy_and_efficiency() {
        let ess = Storage::new(StorageId::new(1), "ESS 1", BusId::new(2), 50.0, 4.0)
            .with_round_trip_efficiency(0.81);
        assert_eq!(ess.energy_capacity(), MegawattHours(200.0));
        assert!((ess.charge_efficiency - 0.9).abs() < 1e-12);
        assert!((ess.discharge_efficiency - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(BusId::new(3).to_string(), "Bus 3");
        assert_eq!(StorageId::new(1).to_string(), "ESS 1");
    }
}
