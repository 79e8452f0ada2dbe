//! Monte Carlo study tests

use rand::rngs::StdRng;
use rand::SeedableRng;
use sra_algo::{
    advance_state, build_matrices, monte_carlo, worker_seed, ClarabelBackend, ComponentState,
    DispatchBackend, DispatchError, DispatchInput, DispatchMode, DispatchModel, DispatchSolution,
    IndexAccumulator, OutageTracker, StudyConfig, StudyMatrices, TransitionModel,
};
use sra_core::{
    Branch, BranchId, Bus, BusId, BusSeries, FailureModel, Gen, GenId, Network, SraError, Storage,
    StorageId,
};

/// One bus, one generator of `capacity` MW serving a flat `load` MW.
fn single_unit(capacity: f64, load: f64, reliability: FailureModel) -> Network {
    let mut network = Network::new(
        vec![Bus::new(BusId::new(1), "bus1")],
        BusSeries::constant("load", vec![load], 24),
    );
    network.add_generator(
        Gen::new(GenId::new(1), "gen1", BusId::new(1))
            .with_p_limits(0.0, capacity)
            .with_cost(10.0)
            .with_reliability(reliability),
    );
    network
}

fn two_bus_reliable() -> Network {
    let buses = vec![Bus::new(BusId::new(1), "bus1"), Bus::new(BusId::new(2), "bus2")];
    let mut network = Network::new(buses, BusSeries::constant("load", vec![10.0, 40.0], 24));
    network.add_generator(
        Gen::new(GenId::new(1), "gen1", BusId::new(1))
            .with_p_limits(0.0, 100.0)
            .with_cost(10.0),
    );
    network.add_branch(Branch::new(
        BranchId::new(1),
        "line1_2",
        BusId::new(1),
        BusId::new(2),
        100.0,
    ));
    network
}

#[test]
fn test_never_failing_system_has_no_loss_of_load() {
    let network = two_bus_reliable();
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 3,
        horizon_hours: 24,
        workers: 2,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run(&network, &matrices, &config).unwrap();

    assert_eq!(result.indices.trials, 3);
    assert_eq!(result.indices.lole, 0.0);
    assert_eq!(result.indices.eue, 0.0);
    assert_eq!(result.indices.lolf, 0.0);
    assert!(result.events.is_empty());
    assert_eq!(result.buses.len(), 2);
    assert!(result.buses.iter().all(|b| b.eue == 0.0 && b.lolh == 0.0));
    assert_eq!(result.hourly_lolp.len(), 24);
}

#[test]
fn test_storage_carries_soc_within_a_trial_and_resets_between_trials() {
    // 40 MW of firm generation for 50 MW of load; the 10 MW / 40 MWh battery
    // starts each trial half full and covers the gap for two hours.
    let mut network = single_unit(40.0, 50.0, FailureModel::never_fails());
    network.add_storage(Storage::new(StorageId::new(1), "ess", BusId::new(1), 10.0, 4.0));
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 2,
        horizon_hours: 8,
        workers: 1,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run(&network, &matrices, &config).unwrap();

    assert_eq!(result.indices.lole, 6.0);
    assert_eq!(result.indices.lolf, 1.0);
    assert_eq!(result.indices.mdt, 6.0);
    assert!((result.indices.eue - 60.0).abs() < 1e-2);
    assert_eq!(&result.hourly_lolp[..2], &[0.0, 0.0]);
    assert!(result.hourly_lolp[2..].iter().all(|p| *p == 1.0));

    assert_eq!(result.events.len(), 2);
    for (trial, event) in result.events.iter().enumerate() {
        assert_eq!(event.trial, trial);
        assert_eq!(event.start_hour, 2);
        assert_eq!(event.duration_hours, 6);
    }
}

#[test]
fn test_lolh_matches_replayed_failure_sequence() {
    let reliability = FailureModel::new(50.0, 10.0);
    let network = single_unit(100.0, 50.0, reliability);
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 2,
        horizon_hours: 200,
        workers: 1,
        seed: 7,
        dispatch_mode: DispatchMode::Lite,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run(&network, &matrices, &config).unwrap();

    // one generator, no branches, storage or renewables: one draw per hour
    let model = TransitionModel::two_state(&reliability);
    let mut rng = StdRng::seed_from_u64(worker_seed(config.seed, 0));
    let mut down_hours = 0usize;
    let mut events = 0usize;
    for _ in 0..config.trials {
        let mut state = ComponentState::Up;
        let mut was_down = false;
        for _ in 0..config.horizon_hours {
            state = advance_state(&model, state, 1.0, &mut rng);
            let down = state == ComponentState::Down;
            if down {
                down_hours += 1;
                if !was_down {
                    events += 1;
                }
            }
            was_down = down;
        }
    }
    assert!(down_hours > 0, "seed should produce at least one outage");

    let trials = config.trials as f64;
    assert_eq!(result.indices.lolh, down_hours as f64 / trials);
    assert_eq!(result.indices.lolf, events as f64 / trials);
    let expected_eue = 50.0 * down_hours as f64 / trials;
    assert!((result.indices.eue - expected_eue).abs() < 1e-2);
    assert_eq!(result.events.len(), events);
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let network = single_unit(100.0, 60.0, FailureModel::new(80.0, 8.0));
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 6,
        horizon_hours: 48,
        workers: 3,
        seed: 2024,
        dispatch_mode: DispatchMode::Lite,
        ..StudyConfig::default()
    };
    let first = monte_carlo::run(&network, &matrices, &config).unwrap();
    let second = monte_carlo::run(&network, &matrices, &config).unwrap();

    assert_eq!(first.indices, second.indices);
    assert_eq!(first.events, second.events);
    assert_eq!(first.hourly_lolp, second.hourly_lolp);
}

#[test]
fn test_single_load_spike_scenario() {
    // three trials of 24 h on a reliable 100 MW system; trial 2 sees a
    // 120 MW load spike at hour 10
    let network = single_unit(100.0, 50.0, FailureModel::never_fails());
    let matrices = build_matrices(&network).unwrap();
    let model = DispatchModel::new(&network, DispatchMode::Full, 100.0, 1000.0).unwrap();

    let mut accumulator = IndexAccumulator::new(sra_algo::indices::AccumulatorShape {
        horizon_hours: 24,
        hours_per_day: 24,
        n_bus: 1,
    });
    for trial in 0..3 {
        let mut tracker = OutageTracker::new(trial, 24, 1, 1e-4);
        for hour in 0..24 {
            let load = if trial == 2 && hour == 10 { 120.0 } else { 50.0 };
            let input = DispatchInput {
                load: &[load],
                renewable: &[0.0],
                gen_available: &[100.0],
                branch_available: &[],
                storage_power: &[],
                soc: &[],
                soc_min: &[],
                soc_max: &[],
            };
            let solution = ClarabelBackend.solve(&model, &matrices, &input).unwrap();
            tracker.record_hour(&solution.curtailment, hour);
        }
        accumulator = accumulator.fold_trial(&tracker.finish());
    }
    let indices = accumulator.finalize();

    assert!((indices.lole - 1.0 / 3.0).abs() < 1e-12);
    assert!((indices.eue - 20.0 / 3.0).abs() < 1e-3);
    assert!((indices.lolf - 1.0 / 3.0).abs() < 1e-12);
    assert!((indices.epns - 20.0 / 3.0).abs() < 1e-3);
    assert!((indices.mdt - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_invalid_costs_rejected_at_study_start() {
    let mut network = single_unit(100.0, 50.0, FailureModel::never_fails());
    network.generators[0].cost = 5000.0;
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 1,
        horizon_hours: 4,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run(&network, &matrices, &config);
    assert!(matches!(result, Err(SraError::Config(_))));
}

struct FailingBackend;

impl DispatchBackend for FailingBackend {
    fn id(&self) -> &str {
        "failing"
    }

    fn solve(
        &self,
        _model: &DispatchModel,
        _matrices: &StudyMatrices,
        _input: &DispatchInput<'_>,
    ) -> Result<DispatchSolution, DispatchError> {
        Err(DispatchError::Infeasible("test backend".to_string()))
    }
}

#[test]
fn test_dispatch_failure_aborts_study() {
    let network = single_unit(100.0, 50.0, FailureModel::never_fails());
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 2,
        horizon_hours: 4,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run_with_backend(&network, &matrices, &config, &FailingBackend);
    match result {
        Err(SraError::DispatchInfeasible { trial, hour, .. }) => {
            assert_eq!(trial, 0);
            assert_eq!(hour, 0);
        }
        other => panic!("expected DispatchInfeasible, got {:?}", other.map(|r| r.indices)),
    }
}

struct PanickingBackend;

impl DispatchBackend for PanickingBackend {
    fn id(&self) -> &str {
        "panicking"
    }

    fn solve(
        &self,
        _model: &DispatchModel,
        _matrices: &StudyMatrices,
        _input: &DispatchInput<'_>,
    ) -> Result<DispatchSolution, DispatchError> {
        panic!("backend crashed")
    }
}

#[test]
fn test_worker_panic_reported_as_failure() {
    let network = single_unit(100.0, 50.0, FailureModel::never_fails());
    let matrices = build_matrices(&network).unwrap();
    let config = StudyConfig {
        trials: 1,
        horizon_hours: 4,
        ..StudyConfig::default()
    };
    let result = monte_carlo::run_with_backend(&network, &matrices, &config, &PanickingBackend);
    match result {
        Err(SraError::WorkerFailure { worker, reason }) => {
            assert_eq!(worker, 0);
            assert!(reason.contains("backend crashed"));
        }
        other => panic!("expected WorkerFailure, got {:?}", other.map(|r| r.indices)),
    }
}
