//! Storage columns and constraints shared by both dispatch formulations.
//!
//! The end-of-hour SOC is not a column of its own; it is the expression
//! `SOC_prev + η_c·charge - discharge/η_d`, bounded by the hour's SOC window.
//! A unit with no available power gets no columns and keeps its SOC.

use super::{bounded, value_or_zero, DispatchInput, DispatchModel};
use good_lp::{constraint, Expression, ProblemVariables, Solution, SolverModel, Variable};

/// SOC windows narrower than this (per-unit) are held as an equality.
const SOC_WINDOW_EPS: f64 = 1e-9;

pub(super) struct StorageVars {
    charge: Vec<Option<Variable>>,
    discharge: Vec<Option<Variable>>,
}

/// Storage results in MW / MWh.
pub(super) struct StorageResult {
    pub charge: Vec<f64>,
    pub discharge: Vec<f64>,
    pub soc: Vec<f64>,
}

impl StorageVars {
    pub(super) fn add(vars: &mut ProblemVariables, input: &DispatchInput<'_>, base: f64) -> Self {
        let (charge, discharge) = input
            .storage_power
            .iter()
            .map(|p| {
                let power = p.max(0.0) / base;
                (bounded(vars, power), bounded(vars, power))
            })
            .unzip();
        Self { charge, discharge }
    }

    pub(super) fn charge(&self, s: usize) -> Option<Variable> {
        self.charge[s]
    }

    pub(super) fn discharge(&self, s: usize) -> Option<Variable> {
        self.discharge[s]
    }

    pub(super) fn add_costs(&self, objective: &mut Expression, model: &DispatchModel) {
        let base = model.base_mva;
        for s in 0..self.charge.len() {
            if let Some(c) = self.charge[s] {
                *objective += (model.charge_cost[s] * base) * c;
            }
            if let Some(d) = self.discharge[s] {
                *objective += (model.discharge_cost[s] * base) * d;
            }
        }
    }

    /// SOC window and the shared power limit for a one-hour step.
    pub(super) fn constrain<M: SolverModel>(
        &self,
        mut problem: M,
        model: &DispatchModel,
        input: &DispatchInput<'_>,
    ) -> M {
        let base = model.base_mva;
        for s in 0..self.charge.len() {
            let (Some(c), Some(d)) = (self.charge[s], self.discharge[s]) else {
                continue;
            };
            let eta_c = model.charge_efficiency[s];
            let eta_d = model.discharge_efficiency[s];
            let mut soc = Expression::from(input.soc[s] / base);
            soc += eta_c * c;
            soc -= (1.0 / eta_d) * d;
            let lo = input.soc_min[s] / base;
            let hi = input.soc_max[s] / base;
            if hi - lo > SOC_WINDOW_EPS {
                problem = problem.with(constraint!(soc.clone() >= lo));
                problem = problem.with(constraint!(soc <= hi));
            } else {
                problem = problem.with(constraint!(soc == lo));
            }
            let power = input.storage_power[s].max(0.0) / base;
            problem = problem.with(constraint!(c + d <= power));
        }
        problem
    }

    pub(super) fn extract<S: Solution>(
        &self,
        solution: &S,
        model: &DispatchModel,
        input: &DispatchInput<'_>,
    ) -> StorageResult {
        let base = model.base_mva;
        let n = self.charge.len();
        let mut result = StorageResult {
            charge: Vec::with_capacity(n),
            discharge: Vec::with_capacity(n),
            soc: Vec::with_capacity(n),
        };
        for s in 0..n {
            let power = input.storage_power[s].max(0.0);
            let charge = (value_or_zero(solution, self.charge[s]) * base).clamp(0.0, power);
            let discharge = (value_or_zero(solution, self.discharge[s]) * base).clamp(0.0, power);
            let soc = input.soc[s] + model.charge_efficiency[s] * charge
                - discharge / model.discharge_efficiency[s];
            result.charge.push(charge);
            result.discharge.push(discharge);
            result.soc.push(soc.clamp(input.soc_min[s], input.soc_max[s]));
        }
        result
    }
}

/// `(charge_cost·c + discharge_cost·d)` in dollars for one hour.
pub(super) fn storage_cost(model: &DispatchModel, result: &StorageResult) -> f64 {
    (0..result.charge.len())
        .map(|s| model.charge_cost[s] * result.charge[s] + model.discharge_cost[s] * result.discharge[s])
        .sum()
}
