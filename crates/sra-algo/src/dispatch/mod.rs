//! Hourly dispatch: a linear program that serves load at minimum cost, with
//! load curtailment as a heavily penalised slack.
//!
//! Two formulations share one objective:
//!
//! ```text
//! minimise  BigM·Σ curtailment + Σ c_g·gen + Σ c_d·discharge + Σ c_c·charge
//! ```
//!
//! - [`DispatchMode::Full`] enforces nodal balance at every bus through the
//!   branch incidence matrix with flows bounded by available branch ratings
//!   (a transportation model).
//! - [`DispatchMode::Lite`] collapses the network to one copper-plate balance
//!   and allocates curtailment back to buses pro rata to load.
//!
//! Storage in both forms obeys
//! `SOC_t = SOC_{t-1} + η_c·charge - discharge/η_d` and `charge + discharge ≤ P_avail`.
//! The LP is scaled to per-unit on `base_mva`; inputs and results are MW/MWh.

mod full;
mod lite;
mod storage;

use crate::matrices::StudyMatrices;
use good_lp::{variable, ProblemVariables, Solution, Variable};
use serde::{Deserialize, Serialize};
use sra_core::Network;
use std::str::FromStr;
use thiserror::Error;

/// Nodal balance residual tolerated after a solve (MW).
pub const BALANCE_TOLERANCE_MW: f64 = 1e-3;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Cost coefficients that would make curtailment or storage cycling attractive
    #[error("Dispatch cost configuration invalid: {0}")]
    InvalidCosts(String),

    /// The LP has no solution despite the curtailment slack
    #[error("Dispatch LP infeasible: {0}")]
    Infeasible(String),

    #[error("Dispatch LP unbounded")]
    Unbounded,

    /// Backend reported a numerical or internal failure
    #[error("Dispatch solver failed: {0}")]
    Solver(String),

    /// Input vectors inconsistent with the study matrices
    #[error("Dispatch input shape mismatch: {0}")]
    Shape(String),

    /// Solution violates nodal balance beyond tolerance
    #[error("Nodal balance residual {residual_mw:.3e} MW at bus position {bus}")]
    BalanceResidual { bus: usize, residual_mw: f64 },
}

/// Which dispatch formulation a study solves each hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    #[default]
    Full,
    Lite,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Full => write!(f, "full"),
            DispatchMode::Lite => write!(f, "lite"),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(DispatchMode::Full),
            "lite" => Ok(DispatchMode::Lite),
            other => Err(format!("unknown dispatch mode '{other}' (expected full or lite)")),
        }
    }
}

/// Per-study cost and efficiency data for the dispatch LP, validated once.
#[derive(Debug, Clone)]
pub struct DispatchModel {
    pub mode: DispatchMode,
    pub base_mva: f64,
    /// BigM ($/MWh)
    pub curtailment_cost: f64,
    pub gen_cost: Vec<f64>,
    pub charge_cost: Vec<f64>,
    pub discharge_cost: Vec<f64>,
    pub charge_efficiency: Vec<f64>,
    pub discharge_efficiency: Vec<f64>,
}

impl DispatchModel {
    /// Collect costs from the registry and check that curtailment strictly
    /// dominates every generation and discharge cost, and that no storage
    /// unit profits from charging and discharging at once.
    pub fn new(
        network: &Network,
        mode: DispatchMode,
        base_mva: f64,
        curtailment_cost: f64,
    ) -> Result<Self, DispatchError> {
        if !(base_mva.is_finite() && base_mva > 0.0) {
            return Err(DispatchError::InvalidCosts(format!(
                "base MVA must be positive, got {base_mva}"
            )));
        }
        for gen in &network.generators {
            if gen.cost >= curtailment_cost {
                return Err(DispatchError::InvalidCosts(format!(
                    "curtailment cost {curtailment_cost} $/MWh must exceed {} cost {} $/MWh",
                    gen.id, gen.cost
                )));
            }
        }
        for ess in &network.storage {
            if ess.discharge_cost >= curtailment_cost {
                return Err(DispatchError::InvalidCosts(format!(
                    "curtailment cost {curtailment_cost} $/MWh must exceed {} discharge cost {} $/MWh",
                    ess.id, ess.discharge_cost
                )));
            }
            if ess.charge_cost + ess.discharge_cost < 0.0 {
                return Err(DispatchError::InvalidCosts(format!(
                    "{} charge cost {} plus discharge cost {} is negative",
                    ess.id, ess.charge_cost, ess.discharge_cost
                )));
            }
        }
        Ok(Self {
            mode,
            base_mva,
            curtailment_cost,
            gen_cost: network.generators.iter().map(|g| g.cost).collect(),
            charge_cost: network.storage.iter().map(|s| s.charge_cost).collect(),
            discharge_cost: network.storage.iter().map(|s| s.discharge_cost).collect(),
            charge_efficiency: network.storage.iter().map(|s| s.charge_efficiency).collect(),
            discharge_efficiency: network
                .storage
                .iter()
                .map(|s| s.discharge_efficiency)
                .collect(),
        })
    }
}

/// One hour's operating conditions (MW, MWh), positional like the registry.
#[derive(Debug, Clone)]
pub struct DispatchInput<'a> {
    pub load: &'a [f64],
    pub renewable: &'a [f64],
    pub gen_available: &'a [f64],
    pub branch_available: &'a [f64],
    pub storage_power: &'a [f64],
    /// Stored energy at the start of the hour
    pub soc: &'a [f64],
    pub soc_min: &'a [f64],
    pub soc_max: &'a [f64],
}

impl DispatchInput<'_> {
    fn check_shape(&self, matrices: &StudyMatrices) -> Result<(), DispatchError> {
        let checks = [
            ("load", self.load.len(), matrices.n_bus()),
            ("renewable", self.renewable.len(), matrices.n_bus()),
            ("generator", self.gen_available.len(), matrices.n_gen()),
            ("branch", self.branch_available.len(), matrices.n_branch()),
            ("storage power", self.storage_power.len(), matrices.n_storage()),
            ("SOC", self.soc.len(), matrices.n_storage()),
            ("SOC min", self.soc_min.len(), matrices.n_storage()),
            ("SOC max", self.soc_max.len(), matrices.n_storage()),
        ];
        for (what, got, expected) in checks {
            if got != expected {
                return Err(DispatchError::Shape(format!(
                    "{what} vector has {got} entries, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// No load, renewable output, generation or storage power anywhere.
    fn is_idle(&self) -> bool {
        [self.load, self.renewable, self.gen_available, self.storage_power]
            .iter()
            .all(|v| v.iter().all(|x| *x <= 0.0))
    }
}

/// Result of one hour's dispatch (MW, MWh).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSolution {
    pub gen_output: Vec<f64>,
    /// Positive from-bus → to-bus; zero in lite mode
    pub branch_flow: Vec<f64>,
    pub charge: Vec<f64>,
    pub discharge: Vec<f64>,
    /// Stored energy at the end of the hour
    pub soc: Vec<f64>,
    pub curtailment: Vec<f64>,
    pub spill: Vec<f64>,
    /// Dispatch cost ($) including the curtailment penalty
    pub objective: f64,
}

impl DispatchSolution {
    pub fn total_curtailment(&self) -> f64 {
        self.curtailment.iter().sum()
    }

    /// Whether any bus curtails more than `tolerance_mw`.
    pub fn has_loss_of_load(&self, tolerance_mw: f64) -> bool {
        self.curtailment.iter().any(|c| *c > tolerance_mw)
    }
}

/// LP backend seam: builds and solves the hour's program for a model.
pub trait DispatchBackend: Send + Sync {
    /// Unique identifier (e.g., "clarabel")
    fn id(&self) -> &str;

    fn solve(
        &self,
        model: &DispatchModel,
        matrices: &StudyMatrices,
        input: &DispatchInput<'_>,
    ) -> Result<DispatchSolution, DispatchError>;
}

/// Interior-point LP backend (pure Rust, via `good_lp`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelBackend;

impl DispatchBackend for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn solve(
        &self,
        model: &DispatchModel,
        matrices: &StudyMatrices,
        input: &DispatchInput<'_>,
    ) -> Result<DispatchSolution, DispatchError> {
        input.check_shape(matrices)?;
        if input.is_idle() {
            return Ok(DispatchSolution {
                gen_output: vec![0.0; matrices.n_gen()],
                branch_flow: vec![0.0; matrices.n_branch()],
                charge: vec![0.0; matrices.n_storage()],
                discharge: vec![0.0; matrices.n_storage()],
                soc: input.soc.to_vec(),
                curtailment: vec![0.0; matrices.n_bus()],
                spill: vec![0.0; matrices.n_bus()],
                objective: 0.0,
            });
        }
        let solution = match model.mode {
            DispatchMode::Full => full::solve(model, matrices, input)?,
            DispatchMode::Lite => lite::solve(model, matrices, input)?,
        };
        check_balance(model.mode, matrices, input, &solution)?;
        Ok(solution)
    }
}

fn check_balance(
    mode: DispatchMode,
    matrices: &StudyMatrices,
    input: &DispatchInput<'_>,
    solution: &DispatchSolution,
) -> Result<(), DispatchError> {
    let nodal = matrices.nodal_residual(
        &solution.gen_output,
        &solution.branch_flow,
        &solution.charge,
        &solution.discharge,
        &solution.curtailment,
        &solution.spill,
        input.load,
        input.renewable,
    );
    let residual = match mode {
        DispatchMode::Full => nodal,
        // copper-plate solutions balance only in aggregate
        DispatchMode::Lite => vec![nodal.iter().sum()],
    };
    match residual
        .iter()
        .enumerate()
        .find(|(_, r)| r.abs() > BALANCE_TOLERANCE_MW)
    {
        Some((bus, r)) => Err(DispatchError::BalanceResidual {
            bus,
            residual_mw: *r,
        }),
        None => Ok(()),
    }
}

/// Non-negative column bounded by `upper` (per-unit). Zero-width columns are
/// left out of the program and read back as zero.
fn bounded(vars: &mut ProblemVariables, upper: f64) -> Option<Variable> {
    (upper > 0.0).then(|| vars.add(variable().min(0.0).max(upper)))
}

fn value_or_zero<S: Solution>(solution: &S, var: Option<Variable>) -> f64 {
    var.map_or(0.0, |v| solution.value(v))
}

/// Map a `good_lp` resolution failure onto the dispatch error taxonomy.
fn resolution_error(err: good_lp::ResolutionError) -> DispatchError {
    match err {
        good_lp::ResolutionError::Infeasible => {
            DispatchError::Infeasible("solver reported primal infeasibility".to_string())
        }
        good_lp::ResolutionError::Unbounded => DispatchError::Unbounded,
        other => DispatchError::Solver(other.to_string()),
    }
}
