//! Network-constrained dispatch (transportation model).
//!
//! Variables (per-unit on `base_mva`):
//! - `gen[g] ∈ [0, available_g]`
//! - `flow[l] ∈ [-available_l, available_l]`
//! - `charge[s], discharge[s] ∈ [0, P_s]`
//! - `curtail[i] ∈ [0, load_i]`, `spill[i] ∈ [0, renewable_i]`
//!
//! Nodal balance at every bus `i`:
//!
//! ```text
//! (G·gen)_i + (D·discharge)_i - (C·charge)_i - (A·flow)_i + curtail_i - spill_i = load_i - renewable_i
//! ```
//!
//! Zero output everywhere with `curtail = load` and `spill = renewable` always
//! satisfies the program, so infeasibility signals a construction defect.

use super::storage::{storage_cost, StorageVars};
use super::{
    bounded, resolution_error, value_or_zero, DispatchError, DispatchInput, DispatchModel,
    DispatchSolution,
};
use crate::matrices::StudyMatrices;
use good_lp::solvers::clarabel::clarabel;
use good_lp::{constraint, variable, variables, Expression, SolverModel, Variable};
use tracing::trace;

pub(super) fn solve(
    model: &DispatchModel,
    matrices: &StudyMatrices,
    input: &DispatchInput<'_>,
) -> Result<DispatchSolution, DispatchError> {
    let base = model.base_mva;
    let pu = |mw: f64| mw.max(0.0) / base;

    let mut vars = variables!();
    let gen: Vec<Option<Variable>> = input
        .gen_available
        .iter()
        .map(|p| bounded(&mut vars, pu(*p)))
        .collect();
    let flow: Vec<Option<Variable>> = input
        .branch_available
        .iter()
        .map(|cap| {
            let cap = pu(*cap);
            (cap > 0.0).then(|| vars.add(variable().min(-cap).max(cap)))
        })
        .collect();
    let storage = StorageVars::add(&mut vars, input, base);
    let curtail: Vec<Option<Variable>> = input
        .load
        .iter()
        .map(|l| bounded(&mut vars, pu(*l)))
        .collect();
    let spill: Vec<Option<Variable>> = input
        .renewable
        .iter()
        .map(|r| bounded(&mut vars, pu(*r)))
        .collect();

    let mut objective = Expression::from(0.0);
    for (g, v) in gen.iter().enumerate() {
        if let Some(v) = v {
            objective += (model.gen_cost[g] * base) * *v;
        }
    }
    storage.add_costs(&mut objective, model);
    for v in curtail.iter().flatten() {
        objective += (model.curtailment_cost * base) * *v;
    }

    let mut problem = vars.minimise(objective).using(clarabel);
    for bus in 0..matrices.n_bus() {
        let mut balance = Expression::from(0.0);
        let mut terms = 0;
        let mut add = |coefficient: f64, var: Option<Variable>| {
            if let Some(v) = var {
                balance += coefficient * v;
                terms += 1;
            }
        };
        for (g, a) in StudyMatrices::row_entries(&matrices.gen_map, bus) {
            add(a, gen[g]);
        }
        for (s, a) in StudyMatrices::row_entries(&matrices.discharge_map, bus) {
            add(a, storage.discharge(s));
        }
        for (s, a) in StudyMatrices::row_entries(&matrices.charge_map, bus) {
            add(-a, storage.charge(s));
        }
        for (l, a) in StudyMatrices::row_entries(&matrices.incidence, bus) {
            add(-a, flow[l]);
        }
        for (i, a) in StudyMatrices::row_entries(&matrices.curtail_map, bus) {
            add(a, curtail[i]);
        }
        add(-1.0, spill[bus]);
        // an isolated bus with nothing on it balances trivially
        if terms == 0 {
            continue;
        }
        let net_load = (input.load[bus].max(0.0) - input.renewable[bus].max(0.0)) / base;
        problem = problem.with(constraint!(balance == net_load));
    }
    problem = storage.constrain(problem, model, input);

    let solution = problem.solve().map_err(resolution_error)?;

    let gen_output: Vec<f64> = gen
        .iter()
        .zip(input.gen_available)
        .map(|(v, avail)| (value_or_zero(&solution, *v) * base).clamp(0.0, avail.max(0.0)))
        .collect();
    let branch_flow: Vec<f64> = flow
        .iter()
        .zip(input.branch_available)
        .map(|(v, cap)| {
            let cap = cap.max(0.0);
            (value_or_zero(&solution, *v) * base).clamp(-cap, cap)
        })
        .collect();
    let curtailment: Vec<f64> = curtail
        .iter()
        .zip(input.load)
        .map(|(v, l)| (value_or_zero(&solution, *v) * base).clamp(0.0, l.max(0.0)))
        .collect();
    let spill: Vec<f64> = spill
        .iter()
        .zip(input.renewable)
        .map(|(v, r)| (value_or_zero(&solution, *v) * base).clamp(0.0, r.max(0.0)))
        .collect();
    let stored = storage.extract(&solution, model, input);

    let total_curtailment: f64 = curtailment.iter().sum();
    let objective = gen_output
        .iter()
        .zip(&model.gen_cost)
        .map(|(p, c)| p * c)
        .sum::<f64>()
        + storage_cost(model, &stored)
        + model.curtailment_cost * total_curtailment;
    trace!(objective, curtailment = total_curtailment, "full dispatch");

    Ok(DispatchSolution {
        gen_output,
        branch_flow,
        charge: stored.charge,
        discharge: stored.discharge,
        soc: stored.soc,
        curtailment,
        spill,
        objective,
    })
}
