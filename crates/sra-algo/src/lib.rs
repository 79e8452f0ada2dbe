//! # sra-algo: Sequential Monte Carlo Reliability Engine
//!
//! Simulates a power system hour by hour over many independent trials,
//! drawing component failures and repairs, dispatching the surviving fleet
//! with a linear program, and turning the resulting load curtailment into
//! adequacy indices.
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Matrix builder | [`matrices`] | Incidence and bus-asset maps ([`StudyMatrices`]) |
//! | State engine | [`state`] | Per-hour availability and storage SOC ([`TrialState`]) |
//! | Dispatch | [`dispatch`] | Hourly LP solution ([`DispatchSolution`]) |
//! | Outage tracker | [`outage`] | Loss-of-load events per trial ([`TrialOutcome`]) |
//! | Aggregator | [`indices`] | LOLE, EUE, LOLF, EPNS, MDT ([`ReliabilityIndices`]) |
//! | Driver | [`monte_carlo`] | Parallel study ([`StudyResult`]) |
//!
//! ### Dispatch
//!
//! Two formulations sit behind the [`DispatchBackend`] seam:
//!
//! - [`DispatchMode::Full`]: nodal balance at every bus with branch flows
//!   bounded by available ratings (transportation model).
//! - [`DispatchMode::Lite`]: one copper-plate balance; curtailment is
//!   allocated to buses pro rata to load.
//!
//! Curtailment is priced at a BigM that must dominate every other cost, so the
//! LP only sheds load when supply or transfer capability runs out.
//!
//! ### Reproducibility
//!
//! Worker `w` draws from `StdRng::seed_from_u64(worker_seed(seed, w))` and
//! handles a fixed contiguous block of trials. Partial results merge in
//! worker order, so `(seed, workers)` fully determines a study's output.
//!
//! ## Example
//!
//! ```rust
//! use sra_algo::{build_matrices, monte_carlo, DispatchMode, StudyConfig};
//! use sra_core::*;
//!
//! let load = BusSeries::constant("load", vec![50.0], 24);
//! let mut network = Network::new(vec![Bus::new(BusId::new(1), "Main")], load);
//! network.add_generator(
//!     Gen::new(GenId::new(1), "Unit 1", BusId::new(1)).with_p_limits(0.0, 100.0),
//! );
//!
//! let matrices = build_matrices(&network)?;
//! let config = StudyConfig {
//!     trials: 2,
//!     horizon_hours: 24,
//!     dispatch_mode: DispatchMode::Lite,
//!     ..StudyConfig::default()
//! };
//! let result = monte_carlo::run(&network, &matrices, &config)?;
//! assert_eq!(result.indices.lole, 0.0);
//! # Ok::<(), SraError>(())
//! ```

pub mod dispatch;
pub mod indices;
pub mod matrices;
pub mod monte_carlo;
pub mod outage;
pub mod state;

pub use dispatch::{
    ClarabelBackend, DispatchBackend, DispatchError, DispatchInput, DispatchMode, DispatchModel,
    DispatchSolution, BALANCE_TOLERANCE_MW,
};
pub use indices::{HeatMap, IndexAccumulator, ReliabilityIndices, RunningStats};
pub use matrices::{build_matrices, MatrixSummary, StudyMatrices};
pub use monte_carlo::{worker_seed, BusIndices, StudyConfig, StudyResult};
pub use outage::{OutageRecord, OutageTracker, TrialOutcome};
pub use state::{advance_state, ComponentModels, ComponentState, TransitionModel, TrialState};
