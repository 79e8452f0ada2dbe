//! Sequential Monte Carlo study driver.
//!
//! Trials are split into contiguous ranges, one per worker. Each worker owns
//! its RNG stream (seeded from the study seed and its worker id), its
//! [`TrialState`] and a private [`IndexAccumulator`]; nothing mutable is
//! shared. Workers report over a channel and the driver merges their partial
//! accumulators in worker-id order, so a fixed seed and worker count always
//! reproduce the same indices.
//!
//! Each trial steps through the horizon one hour at a time:
//!
//! 1. transition every component (generators, branches, storage),
//! 2. solve the hour's dispatch,
//! 3. carry the end-of-hour SOC forward,
//! 4. feed the curtailment into the trial's [`OutageTracker`].

use crate::dispatch::{ClarabelBackend, DispatchBackend, DispatchInput, DispatchMode, DispatchModel};
use crate::indices::{AccumulatorShape, HeatMap, IndexAccumulator, ReliabilityIndices};
use crate::matrices::StudyMatrices;
use crate::outage::{OutageRecord, OutageTracker, TrialOutcome};
use crate::state::{ComponentModels, TrialState};
use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sra_core::{BusId, Network, SraError, SraResult};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, debug_span, error, info, info_span, warn, Span};

/// Simulation step (hours).
pub const STEP_HOURS: f64 = 1.0;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Study parameters. Every field has a default, so a partial TOML table works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    /// Number of simulated horizons
    pub trials: usize,
    /// Hours per trial
    pub horizon_hours: usize,
    pub workers: usize,
    pub seed: u64,
    pub dispatch_mode: DispatchMode,
    pub base_mva: f64,
    /// BigM curtailment penalty ($/MWh)
    pub curtailment_cost: f64,
    /// Curtailment at or below this is solver noise (MW)
    pub curtailment_tolerance_mw: f64,
    /// Day length used for LOLE in days
    pub hours_per_day: usize,
    /// Keep every outage record in the result
    pub record_events: bool,
    /// Target coefficient of variation for LOLH; reported, not enforced
    pub convergence: Option<f64>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            trials: 100,
            horizon_hours: 8760,
            workers: 1,
            seed: 42,
            dispatch_mode: DispatchMode::Full,
            base_mva: 100.0,
            curtailment_cost: 1000.0,
            curtailment_tolerance_mw: 1e-4,
            hours_per_day: 24,
            record_events: true,
            convergence: None,
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> SraResult<()> {
        let mut problems = Vec::new();
        if self.trials == 0 {
            problems.push("trials must be at least 1".to_string());
        }
        if self.horizon_hours == 0 {
            problems.push("horizon_hours must be at least 1".to_string());
        }
        if self.workers == 0 {
            problems.push("workers must be at least 1".to_string());
        }
        if self.hours_per_day == 0 {
            problems.push("hours_per_day must be at least 1".to_string());
        }
        if !(self.base_mva.is_finite() && self.base_mva > 0.0) {
            problems.push(format!("base_mva must be positive, got {}", self.base_mva));
        }
        if !(self.curtailment_cost.is_finite() && self.curtailment_cost > 0.0) {
            problems.push(format!(
                "curtailment_cost must be positive, got {}",
                self.curtailment_cost
            ));
        }
        if !(self.curtailment_tolerance_mw.is_finite() && self.curtailment_tolerance_mw >= 0.0) {
            problems.push(format!(
                "curtailment_tolerance_mw must be non-negative, got {}",
                self.curtailment_tolerance_mw
            ));
        }
        if let Some(target) = self.convergence {
            if !(target.is_finite() && target > 0.0) {
                problems.push(format!("convergence must be positive, got {target}"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SraError::config(problems.join("; ")))
        }
    }

    fn shape(&self, n_bus: usize) -> AccumulatorShape {
        AccumulatorShape {
            horizon_hours: self.horizon_hours,
            hours_per_day: self.hours_per_day,
            n_bus,
        }
    }
}

/// Expected unserved energy and loss-of-load hours at one bus, per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusIndices {
    pub bus: BusId,
    pub name: String,
    pub eue: f64,
    pub lolh: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyResult {
    pub indices: ReliabilityIndices,
    pub buses: Vec<BusIndices>,
    /// Fraction of trials short of supply at each hour of the horizon
    pub hourly_lolp: Vec<f64>,
    pub heat_map: Option<HeatMap>,
    /// Outage records ordered by trial, then start hour
    pub events: Vec<OutageRecord>,
    /// `Some` when a target COV was configured
    pub converged: Option<bool>,
    pub elapsed_secs: f64,
}

/// Per-worker RNG seed: SplitMix64 of the study seed mixed with the worker id.
pub fn worker_seed(seed: u64, worker: usize) -> u64 {
    let mut z = seed ^ GOLDEN_GAMMA.wrapping_mul(worker as u64 + 1);
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Split `trials` into `workers` contiguous ranges; the first
/// `trials % workers` ranges get one extra trial.
pub fn partition_trials(trials: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 {
        return Vec::new();
    }
    let base = trials / workers;
    let extra = trials % workers;
    let mut start = 0;
    (0..workers)
        .map(|w| {
            let len = base + usize::from(w < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Read-only study context shared by every worker.
struct StudyContext<'a> {
    network: &'a Network,
    matrices: &'a StudyMatrices,
    config: &'a StudyConfig,
    models: ComponentModels,
    dispatch: DispatchModel,
    backend: &'a dyn DispatchBackend,
}

struct WorkerReport {
    accumulator: IndexAccumulator,
    events: Vec<OutageRecord>,
}

type WorkerMessage = (usize, std::thread::Result<SraResult<WorkerReport>>);

/// Run a study with the default Clarabel dispatch backend.
pub fn run(network: &Network, matrices: &StudyMatrices, config: &StudyConfig) -> SraResult<StudyResult> {
    run_with_backend(network, matrices, config, &ClarabelBackend)
}

pub fn run_with_backend(
    network: &Network,
    matrices: &StudyMatrices,
    config: &StudyConfig,
    backend: &dyn DispatchBackend,
) -> SraResult<StudyResult> {
    let start = Instant::now();
    config.validate()?;
    let diagnostics = network.ensure_valid()?;
    for issue in diagnostics.warnings() {
        warn!("{}", issue);
    }
    check_matrices(network, matrices)?;
    let dispatch = DispatchModel::new(
        network,
        config.dispatch_mode,
        config.base_mva,
        config.curtailment_cost,
    )
    .map_err(|e| SraError::config(e.to_string()))?;

    let ctx = StudyContext {
        network,
        matrices,
        config,
        models: ComponentModels::from_network(network),
        dispatch,
        backend,
    };
    let shape = config.shape(network.buses.len());

    let study = info_span!(
        "study",
        trials = config.trials,
        horizon = config.horizon_hours,
        workers = config.workers,
        mode = %config.dispatch_mode,
        backend = backend.id(),
    );
    let _guard = study.enter();
    if network.load.hours() < config.horizon_hours {
        debug!(
            load_hours = network.load.hours(),
            "load series shorter than horizon, wrapping"
        );
    }
    info!("starting study");

    let ranges = partition_trials(config.trials, config.workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("sra-worker-{i}"))
        .build()
        .map_err(|e| SraError::Other(format!("failed to build worker pool: {e}")))?;

    let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
    pool.scope(|scope| {
        for (worker, range) in ranges.iter().cloned().enumerate() {
            let tx = tx.clone();
            let ctx = &ctx;
            let parent = study.clone();
            scope.spawn(move |_| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_worker(ctx, &parent, worker, range)
                }));
                // the receiver outlives the scope
                let _ = tx.send((worker, result));
            });
        }
    });
    drop(tx);

    let reports = collect_reports(rx, &ranges, shape).map_err(|err| {
        if err.is_worker_failure() {
            error!(%err, "study aborted");
        }
        err
    })?;
    let mut accumulator = IndexAccumulator::new(shape);
    let mut events = Vec::new();
    for (worker, report) in reports.into_iter().enumerate() {
        accumulator = accumulator
            .merge(&report.accumulator)
            .map_err(|reason| SraError::WorkerFailure { worker, reason })?;
        events.extend(report.events);
    }
    events.sort_by_key(|e| (e.trial, e.start_hour));

    let indices = accumulator.finalize();
    let buses = network
        .buses
        .iter()
        .zip(accumulator.bus_indices())
        .map(|(bus, (eue, lolh))| BusIndices {
            bus: bus.id,
            name: bus.name.clone(),
            eue,
            lolh,
        })
        .collect();
    let converged = config
        .convergence
        .map(|target| indices.lolh_cov.is_some_and(|cov| cov <= target));
    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        lole = indices.lole,
        eue = indices.eue,
        lolf = indices.lolf,
        elapsed_secs,
        "study complete"
    );
    if converged == Some(false) {
        warn!(
            lolh_cov = ?indices.lolh_cov,
            "LOLH coefficient of variation above target; consider more trials"
        );
    }

    Ok(StudyResult {
        indices,
        buses,
        hourly_lolp: accumulator.hourly_lolp(),
        heat_map: accumulator.heat_map(),
        events,
        converged,
        elapsed_secs,
    })
}

fn check_matrices(network: &Network, matrices: &StudyMatrices) -> SraResult<()> {
    let expected = [
        ("bus", network.buses.len(), matrices.n_bus()),
        ("branch", network.branches.len(), matrices.n_branch()),
        ("generator", network.generators.len(), matrices.n_gen()),
        ("storage", network.storage.len(), matrices.n_storage()),
    ];
    for (what, registry, built) in expected {
        if registry != built {
            return Err(SraError::Config(format!(
                "study matrices built for {built} {what}(s), network has {registry}"
            )));
        }
    }
    Ok(())
}

fn run_worker(
    ctx: &StudyContext<'_>,
    parent: &Span,
    worker: usize,
    trials: Range<usize>,
) -> SraResult<WorkerReport> {
    let span = info_span!(parent: parent, "worker", id = worker);
    let _guard = span.enter();
    let mut rng = StdRng::seed_from_u64(worker_seed(ctx.config.seed, worker));
    let mut state = TrialState::new(&ctx.models);
    let mut accumulator = IndexAccumulator::new(ctx.config.shape(ctx.network.buses.len()));
    let mut events = Vec::new();
    let first = trials.start;
    let count = trials.len();

    for trial in trials {
        let outcome = simulate_trial(ctx, trial, &mut state, &mut rng)?;
        if ctx.config.record_events {
            events.extend(outcome.events.iter().cloned());
        }
        accumulator = accumulator.fold_trial(&outcome);
    }
    debug!(first_trial = first, trials = count, "worker finished");
    Ok(WorkerReport {
        accumulator,
        events,
    })
}

fn simulate_trial<R: Rng + ?Sized>(
    ctx: &StudyContext<'_>,
    trial: usize,
    state: &mut TrialState<'_>,
    rng: &mut R,
) -> SraResult<TrialOutcome> {
    let span = debug_span!("trial", id = trial);
    let _guard = span.enter();
    let network = ctx.network;
    let n_bus = network.buses.len();

    state.reset();
    let scenario = if network.renewables.is_empty() {
        None
    } else {
        Some(&network.renewables[rng.gen_range(0..network.renewables.len())])
    };
    let no_renewables = vec![0.0; n_bus];
    let mut tracker = OutageTracker::new(
        trial,
        ctx.config.horizon_hours,
        n_bus,
        ctx.config.curtailment_tolerance_mw,
    );

    for hour in 0..ctx.config.horizon_hours {
        state.advance(STEP_HOURS, rng);
        let gen_available = state.gen_available();
        let branch_available = state.branch_available();
        let storage_power = state.storage_power();
        let (soc_min, soc_max) = state.storage_energy_bounds();
        let input = DispatchInput {
            load: network.load.at(hour),
            renewable: scenario.map_or(no_renewables.as_slice(), |s| s.at(hour)),
            gen_available: &gen_available,
            branch_available: &branch_available,
            storage_power: &storage_power,
            soc: state.soc(),
            soc_min: &soc_min,
            soc_max: &soc_max,
        };
        let solution = ctx
            .backend
            .solve(&ctx.dispatch, ctx.matrices, &input)
            .map_err(|err| SraError::DispatchInfeasible {
                trial,
                hour,
                reason: err.to_string(),
            })?;
        state.commit_soc(&solution.soc);
        tracker.record_hour(&solution.curtailment, hour);
    }
    Ok(tracker.finish())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Gather one report per worker, in worker-id order.
///
/// The first worker error is returned as-is; a panic, a missing or duplicate
/// report, or an accumulator that does not match the study becomes
/// [`SraError::WorkerFailure`].
fn collect_reports(
    rx: Receiver<WorkerMessage>,
    ranges: &[Range<usize>],
    shape: AccumulatorShape,
) -> SraResult<Vec<WorkerReport>> {
    let mut slots: Vec<Option<WorkerReport>> = ranges.iter().map(|_| None).collect();
    for (worker, result) in rx.iter() {
        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(err),
            Err(payload) => {
                return Err(SraError::WorkerFailure {
                    worker,
                    reason: format!("panicked: {}", panic_message(payload.as_ref())),
                })
            }
        };
        match slots.get_mut(worker) {
            Some(slot @ None) => *slot = Some(report),
            Some(Some(_)) => {
                return Err(SraError::WorkerFailure {
                    worker,
                    reason: "reported more than once".to_string(),
                })
            }
            None => {
                return Err(SraError::WorkerFailure {
                    worker,
                    reason: format!("unknown worker id (study has {} workers)", ranges.len()),
                })
            }
        }
    }

    slots
        .into_iter()
        .zip(ranges)
        .enumerate()
        .map(|(worker, (slot, range))| {
            let report = slot.ok_or_else(|| SraError::WorkerFailure {
                worker,
                reason: "did not report a result".to_string(),
            })?;
            let acc = &report.accumulator;
            if acc.shape() != shape || !acc.is_well_formed() {
                return Err(SraError::WorkerFailure {
                    worker,
                    reason: format!("malformed accumulator {:?}, expected {:?}", acc.shape(), shape),
                });
            }
            if acc.trials() != range.len() as u64 {
                return Err(SraError::WorkerFailure {
                    worker,
                    reason: format!(
                        "accumulated {} trials, assigned {}",
                        acc.trials(),
                        range.len()
                    ),
                });
            }
            Ok(report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> AccumulatorShape {
        AccumulatorShape {
            horizon_hours: 4,
            hours_per_day: 24,
            n_bus: 1,
        }
    }

    #[test]
    fn test_study_config_from_partial_json() {
        let config: StudyConfig =
            serde_json::from_str(r#"{"trials": 12, "dispatch_mode": "lite", "convergence": 0.05}"#)
                .unwrap();
        assert_eq!(config.trials, 12);
        assert_eq!(config.dispatch_mode, DispatchMode::Lite);
        assert_eq!(config.convergence, Some(0.05));
        assert_eq!(config.horizon_hours, 8760);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<StudyConfig>(&json).unwrap(), config);
        assert!(serde_json::from_str::<StudyConfig>(r#"{"trails": 1}"#).is_err());
    }

    fn report(trials: usize, shape: AccumulatorShape) -> WorkerReport {
        let mut accumulator = IndexAccumulator::new(shape);
        for trial in 0..trials {
            let tracker = OutageTracker::new(trial, shape.horizon_hours, shape.n_bus, 1e-4);
            accumulator = accumulator.fold_trial(&tracker.finish());
        }
        WorkerReport {
            accumulator,
            events: Vec::new(),
        }
    }

    #[test]
    fn test_partition_is_contiguous_and_complete() {
        let ranges = partition_trials(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
        let ranges = partition_trials(2, 4);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 2);
        assert!(ranges[3].is_empty());
    }

    #[test]
    fn test_worker_seeds_differ() {
        let seeds: Vec<u64> = (0..8).map(|w| worker_seed(42, w)).collect();
        for i in 0..seeds.len() {
            for j in i + 1..seeds.len() {
                assert_ne!(seeds[i], seeds[j]);
            }
        }
        assert_eq!(worker_seed(42, 3), worker_seed(42, 3));
        assert_ne!(worker_seed(42, 0), worker_seed(43, 0));
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = StudyConfig::default();
        assert!(config.validate().is_ok());
        let bad = StudyConfig {
            trials: 0,
            workers: 0,
            ..StudyConfig::default()
        };
        match bad.validate() {
            Err(SraError::Config(msg)) => {
                assert!(msg.contains("trials"));
                assert!(msg.contains("workers"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_worker_is_reported() {
        let ranges = partition_trials(4, 2);
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
        tx.send((0, Ok(Ok(report(2, shape()))))).unwrap();
        drop(tx);
        match collect_reports(rx, &ranges, shape()) {
            Err(SraError::WorkerFailure { worker, .. }) => assert_eq!(worker, 1),
            other => panic!("expected worker failure, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_malformed_accumulator_is_rejected() {
        let ranges = partition_trials(2, 1);
        let wrong = AccumulatorShape {
            horizon_hours: 8,
            ..shape()
        };
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
        tx.send((0, Ok(Ok(report(2, wrong))))).unwrap();
        drop(tx);
        assert!(matches!(
            collect_reports(rx, &ranges, shape()),
            Err(SraError::WorkerFailure { worker: 0, .. })
        ));
    }

    #[test]
    fn test_panicked_worker_is_reported() {
        let ranges = partition_trials(2, 2);
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
        tx.send((0, Ok(Ok(report(1, shape()))))).unwrap();
        let payload: Box<dyn Any + Send> = Box::new("boom");
        tx.send((1, Err(payload))).unwrap();
        drop(tx);
        match collect_reports(rx, &ranges, shape()) {
            Err(SraError::WorkerFailure { worker, reason }) => {
                assert_eq!(worker, 1);
                assert!(reason.contains("boom"));
            }
            other => panic!("expected worker failure, got {:?}", other.map(|r| r.len())),
        }
    }
}
