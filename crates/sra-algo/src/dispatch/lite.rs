//! Copper-plate dispatch: one system-wide balance, no branch limits.
//!
//! ```text
//! Σ gen + Σ discharge - Σ charge + curtail - spill = Σ load - Σ renewable
//! ```
//!
//! Aggregate curtailment is allocated to buses pro rata to their load, and
//! aggregate spill pro rata to renewable output. Branch flows are reported as
//! zero.

use super::storage::{storage_cost, StorageVars};
use super::{
    bounded, resolution_error, value_or_zero, DispatchError, DispatchInput, DispatchModel,
    DispatchSolution,
};
use crate::matrices::StudyMatrices;
use good_lp::solvers::clarabel::clarabel;
use good_lp::{constraint, variables, Expression, SolverModel, Variable};
use tracing::trace;

fn pro_rata(total: f64, weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if sum <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| total * w.max(0.0) / sum).collect()
}

pub(super) fn solve(
    model: &DispatchModel,
    matrices: &StudyMatrices,
    input: &DispatchInput<'_>,
) -> Result<DispatchSolution, DispatchError> {
    let base = model.base_mva;
    let total_load: f64 = input.load.iter().map(|l| l.max(0.0)).sum();
    let total_renewable: f64 = input.renewable.iter().map(|r| r.max(0.0)).sum();

    let mut vars = variables!();
    let gen: Vec<Option<Variable>> = input
        .gen_available
        .iter()
        .map(|p| bounded(&mut vars, p.max(0.0) / base))
        .collect();
    let storage = StorageVars::add(&mut vars, input, base);
    let curtail = bounded(&mut vars, total_load / base);
    let spill = bounded(&mut vars, total_renewable / base);

    let mut objective = Expression::from(0.0);
    for (g, v) in gen.iter().enumerate() {
        if let Some(v) = v {
            objective += (model.gen_cost[g] * base) * *v;
        }
    }
    storage.add_costs(&mut objective, model);
    if let Some(v) = curtail {
        objective += (model.curtailment_cost * base) * v;
    }

    let mut balance = Expression::from(0.0);
    for v in gen.iter().flatten() {
        balance += *v;
    }
    for s in 0..input.storage_power.len() {
        if let Some(d) = storage.discharge(s) {
            balance += d;
        }
        if let Some(c) = storage.charge(s) {
            balance -= c;
        }
    }
    if let Some(v) = curtail {
        balance += v;
    }
    if let Some(v) = spill {
        balance -= v;
    }
    let net_load = (total_load - total_renewable) / base;

    let mut problem = vars
        .minimise(objective)
        .using(clarabel)
        .with(constraint!(balance == net_load));
    problem = storage.constrain(problem, model, input);

    let solution = problem.solve().map_err(resolution_error)?;

    let gen_output: Vec<f64> = gen
        .iter()
        .zip(input.gen_available)
        .map(|(v, avail)| (value_or_zero(&solution, *v) * base).clamp(0.0, avail.max(0.0)))
        .collect();
    let curtailed = (value_or_zero(&solution, curtail) * base).clamp(0.0, total_load);
    let spilled = (value_or_zero(&solution, spill) * base).clamp(0.0, total_renewable);
    let stored = storage.extract(&solution, model, input);

    let objective = gen_output
        .iter()
        .zip(&model.gen_cost)
        .map(|(p, c)| p * c)
        .sum::<f64>()
        + storage_cost(model, &stored)
        + model.curtailment_cost * curtailed;
    trace!(objective, curtailment = curtailed, "lite dispatch");

    Ok(DispatchSolution {
        gen_output,
        branch_flow: vec![0.0; matrices.n_branch()],
        charge: stored.charge,
        discharge: stored.discharge,
        soc: stored.soc,
        curtailment: pro_rata(curtailed, input.load),
        spill: pro_rata(spilled, input.renewable),
        objective,
    })
}
