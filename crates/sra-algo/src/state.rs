//! Component State Engine.
//!
//! Each failable asset evolves as a continuous-time Markov chain sampled at
//! the study step. A two-state component flips Up→Down with probability
//! `1 - exp(-λΔt)` and Down→Up with `1 - exp(-μΔt)`. Multi-state components
//! (derated generators, storage made of several sub-units) carry a rate matrix
//! over the ordered states `[Up, Derated(0), .., Derated(n-1), Down]`; from state
//! `i` with total exit rate `R_i` the step probabilities are
//!
//! ```text
//! p_ij = (r_ij / R_i) * (1 - exp(-R_i Δt))   j != i
//! p_ii = exp(-R_i Δt)
//! ```
//!
//! and the next state is picked by cumulative bucketing of one uniform draw.

use rand::Rng;
use sra_core::{DeratingModel, FailureModel, Network};

/// Operating state of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    Up,
    /// Partial capacity; the payload indexes the model's derated levels
    Derated(usize),
    Down,
}

impl ComponentState {
    fn index(self, n_states: usize) -> usize {
        match self {
            ComponentState::Up => 0,
            ComponentState::Derated(k) => k + 1,
            ComponentState::Down => n_states - 1,
        }
    }

    fn from_index(index: usize, n_states: usize) -> Self {
        if index == 0 {
            ComponentState::Up
        } else if index + 1 >= n_states {
            ComponentState::Down
        } else {
            ComponentState::Derated(index - 1)
        }
    }
}

/// Stochastic transition model of one component.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionModel {
    TwoState {
        failure_rate: f64,
        repair_rate: f64,
    },
    MultiState {
        /// Capacity fraction per state, `[1.0, levels.., 0.0]`
        fractions: Vec<f64>,
        /// Rates (1/h) between states; diagonal ignored
        rates: Vec<Vec<f64>>,
    },
}

impl TransitionModel {
    pub fn two_state(model: &FailureModel) -> Self {
        TransitionModel::TwoState {
            failure_rate: model.failure_rate(),
            repair_rate: model.repair_rate(),
        }
    }

    pub fn derated(model: &DeratingModel) -> Self {
        let mut fractions = Vec::with_capacity(model.num_states());
        fractions.push(1.0);
        fractions.extend(model.levels.iter().copied());
        fractions.push(0.0);
        TransitionModel::MultiState {
            fractions,
            rates: model.rates.clone(),
        }
    }

    /// Birth-death ladder for `units` identical sub-units with one repair crew.
    ///
    /// State `j` has `j` sub-units failed. Failures occur at `(units - j)λ`,
    /// repairs at `μ`. A single unit reduces to the two-state model.
    pub fn sub_unit_ladder(units: u32, model: &FailureModel) -> Self {
        if units <= 1 {
            return Self::two_state(model);
        }
        let n = units as usize;
        let lambda = model.failure_rate();
        let mu = model.repair_rate();
        let mut rates = vec![vec![0.0; n + 1]; n + 1];
        for failed in 0..=n {
            if failed < n {
                rates[failed][failed + 1] = (n - failed) as f64 * lambda;
            }
            if failed > 0 {
                rates[failed][failed - 1] = mu;
            }
        }
        let fractions = (0..=n).map(|failed| (n - failed) as f64 / n as f64).collect();
        TransitionModel::MultiState { fractions, rates }
    }

    pub fn num_states(&self) -> usize {
        match self {
            TransitionModel::TwoState { .. } => 2,
            TransitionModel::MultiState { fractions, .. } => fractions.len(),
        }
    }

    /// Available share of nameplate capacity in `state`, within `[0, 1]`.
    pub fn capacity_fraction(&self, state: ComponentState) -> f64 {
        match (self, state) {
            (_, ComponentState::Up) => 1.0,
            (_, ComponentState::Down) => 0.0,
            (TransitionModel::TwoState { .. }, ComponentState::Derated(_)) => 0.0,
            (TransitionModel::MultiState { fractions, .. }, ComponentState::Derated(k)) => {
                fractions.get(k + 1).copied().unwrap_or(0.0).clamp(0.0, 1.0)
            }
        }
    }

    /// Probability of each next state after `elapsed_hours`, starting from `state`.
    pub fn step_probabilities(&self, state: ComponentState, elapsed_hours: f64) -> Vec<f64> {
        match self {
            TransitionModel::TwoState {
                failure_rate,
                repair_rate,
            } => {
                let up = state == ComponentState::Up;
                let rate = if up { *failure_rate } else { *repair_rate };
                let leave = 1.0 - (-rate * elapsed_hours).exp();
                if up {
                    vec![1.0 - leave, leave]
                } else {
                    vec![leave, 1.0 - leave]
                }
            }
            TransitionModel::MultiState { rates, .. } => {
                let n = rates.len();
                let i = state.index(n);
                let exit: f64 = rates[i]
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, r)| *r)
                    .sum();
                let stay = (-exit * elapsed_hours).exp();
                (0..n)
                    .map(|j| {
                        if j == i {
                            stay
                        } else if exit > 0.0 {
                            rates[i][j] / exit * (1.0 - stay)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Draw the state of one component after `elapsed_hours` using a single
/// uniform sample from `rng`.
pub fn advance_state<R: Rng + ?Sized>(
    model: &TransitionModel,
    state: ComponentState,
    elapsed_hours: f64,
    rng: &mut R,
) -> ComponentState {
    let draw: f64 = rng.gen();
    match model {
        TransitionModel::TwoState {
            failure_rate,
            repair_rate,
        } => match state {
            ComponentState::Up => {
                if draw < 1.0 - (-failure_rate * elapsed_hours).exp() {
                    ComponentState::Down
                } else {
                    ComponentState::Up
                }
            }
            _ => {
                if draw < 1.0 - (-repair_rate * elapsed_hours).exp() {
                    ComponentState::Up
                } else {
                    ComponentState::Down
                }
            }
        },
        TransitionModel::MultiState { .. } => {
            let n = model.num_states();
            let probabilities = model.step_probabilities(state, elapsed_hours);
            let mut cumulative = 0.0;
            for (j, p) in probabilities.iter().enumerate() {
                cumulative += p;
                if draw < cumulative {
                    return ComponentState::from_index(j, n);
                }
            }
            // draw landed in rounding slack above the last bucket
            state
        }
    }
}

/// Per-study transition models and ratings, positional like the registry.
#[derive(Debug, Clone)]
pub struct ComponentModels {
    pub gens: Vec<TransitionModel>,
    pub branches: Vec<TransitionModel>,
    pub storage: Vec<TransitionModel>,
    gen_pmax: Vec<f64>,
    branch_rating: Vec<f64>,
    ess_pmax: Vec<f64>,
    ess_energy: Vec<f64>,
    ess_soc_min: Vec<f64>,
    ess_soc_max: Vec<f64>,
}

impl ComponentModels {
    pub fn from_network(network: &Network) -> Self {
        Self {
            gens: network
                .generators
                .iter()
                .map(|gen| match &gen.derating {
                    Some(derating) => TransitionModel::derated(derating),
                    None => TransitionModel::two_state(&gen.reliability),
                })
                .collect(),
            branches: network
                .branches
                .iter()
                .map(|branch| TransitionModel::two_state(&branch.reliability))
                .collect(),
            storage: network
                .storage
                .iter()
                .map(|ess| TransitionModel::sub_unit_ladder(ess.units, &ess.reliability))
                .collect(),
            gen_pmax: network.generators.iter().map(|g| g.pmax.value()).collect(),
            branch_rating: network.branches.iter().map(|b| b.rating.value()).collect(),
            ess_pmax: network.storage.iter().map(|s| s.pmax.value()).collect(),
            ess_energy: network
                .storage
                .iter()
                .map(|s| s.energy_capacity().value())
                .collect(),
            ess_soc_min: network.storage.iter().map(|s| s.soc_min).collect(),
            ess_soc_max: network.storage.iter().map(|s| s.soc_max).collect(),
        }
    }
}

/// Every component state and storage SOC for one trial.
///
/// Owned by exactly one worker's current trial; [`TrialState::reset`] restores
/// the trial-start condition (all Up, SOC at half of its maximum).
#[derive(Debug, Clone)]
pub struct TrialState<'a> {
    models: &'a ComponentModels,
    gen_states: Vec<ComponentState>,
    branch_states: Vec<ComponentState>,
    storage_states: Vec<ComponentState>,
    /// Stored energy (MWh)
    soc: Vec<f64>,
    /// Storage availability fraction the current SOC was computed under
    soc_fraction: Vec<f64>,
}

impl<'a> TrialState<'a> {
    pub fn new(models: &'a ComponentModels) -> Self {
        let mut state = Self {
            models,
            gen_states: Vec::new(),
            branch_states: Vec::new(),
            storage_states: Vec::new(),
            soc: Vec::new(),
            soc_fraction: Vec::new(),
        };
        state.reset();
        state
    }

    pub fn reset(&mut self) {
        let m = self.models;
        self.gen_states = vec![ComponentState::Up; m.gens.len()];
        self.branch_states = vec![ComponentState::Up; m.branches.len()];
        self.storage_states = vec![ComponentState::Up; m.storage.len()];
        self.soc = m
            .ess_energy
            .iter()
            .zip(&m.ess_soc_max)
            .map(|(energy, soc_max)| 0.5 * soc_max * energy)
            .collect();
        self.soc_fraction = vec![1.0; m.storage.len()];
    }

    /// Advance every component one step (generators, then branches, then
    /// storage; one draw each) and re-align SOC with storage availability.
    pub fn advance<R: Rng + ?Sized>(&mut self, elapsed_hours: f64, rng: &mut R) {
        let m = self.models;
        for (state, model) in self.gen_states.iter_mut().zip(&m.gens) {
            *state = advance_state(model, *state, elapsed_hours, rng);
        }
        for (state, model) in self.branch_states.iter_mut().zip(&m.branches) {
            *state = advance_state(model, *state, elapsed_hours, rng);
        }
        for (state, model) in self.storage_states.iter_mut().zip(&m.storage) {
            *state = advance_state(model, *state, elapsed_hours, rng);
        }
        self.update_soc();
    }

    /// Rescale stored energy when a unit's available fraction changes (failed
    /// sub-units lose their share), then clamp into the current SOC window.
    fn update_soc(&mut self) {
        let m = self.models;
        for s in 0..self.soc.len() {
            let fraction = m.storage[s].capacity_fraction(self.storage_states[s]);
            let previous = self.soc_fraction[s];
            if fraction != previous {
                if previous == 0.0 {
                    self.soc[s] = m.ess_soc_min[s] * m.ess_energy[s] * fraction;
                } else {
                    self.soc[s] *= fraction / previous;
                }
                self.soc_fraction[s] = fraction;
            }
            let (lo, hi) = self.soc_bounds(s);
            self.soc[s] = self.soc[s].clamp(lo, hi);
        }
    }

    fn soc_bounds(&self, s: usize) -> (f64, f64) {
        let m = self.models;
        let energy = m.ess_energy[s] * self.soc_fraction[s];
        (m.ess_soc_min[s] * energy, m.ess_soc_max[s] * energy)
    }

    pub fn gen_states(&self) -> &[ComponentState] {
        &self.gen_states
    }

    pub fn branch_states(&self) -> &[ComponentState] {
        &self.branch_states
    }

    pub fn storage_states(&self) -> &[ComponentState] {
        &self.storage_states
    }

    /// Available generator capacity (MW)
    pub fn gen_available(&self) -> Vec<f64> {
        let m = self.models;
        self.gen_states
            .iter()
            .enumerate()
            .map(|(g, state)| m.gen_pmax[g] * m.gens[g].capacity_fraction(*state))
            .collect()
    }

    /// Available branch transfer limit (MW)
    pub fn branch_available(&self) -> Vec<f64> {
        let m = self.models;
        self.branch_states
            .iter()
            .enumerate()
            .map(|(l, state)| m.branch_rating[l] * m.branches[l].capacity_fraction(*state))
            .collect()
    }

    /// Available storage charge/discharge power (MW)
    pub fn storage_power(&self) -> Vec<f64> {
        let m = self.models;
        self.storage_states
            .iter()
            .enumerate()
            .map(|(s, state)| m.ess_pmax[s] * m.storage[s].capacity_fraction(*state))
            .collect()
    }

    /// Current `(min, max)` stored energy window (MWh) per storage unit.
    pub fn storage_energy_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (0..self.soc.len()).map(|s| self.soc_bounds(s)).unzip()
    }

    /// Stored energy (MWh)
    pub fn soc(&self) -> &[f64] {
        &self.soc
    }

    /// Carry the dispatch result's end-of-hour SOC forward, clamped into bounds.
    pub fn commit_soc(&mut self, soc: &[f64]) {
        for s in 0..self.soc.len().min(soc.len()) {
            let (lo, hi) = self.soc_bounds(s);
            self.soc[s] = soc[s].clamp(lo, hi);
        }
    }
}
