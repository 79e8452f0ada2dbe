//! Error type shared by every stage of a study
//!
//! This module provides a common error type [`SraError`] that every stage of a
//! reliability study can surface. Subsystem errors (dispatch, importers) are
//! converted to `SraError` at API boundaries, carrying trial/hour or worker
//! context where the failure happened.
//!
//! # Example
//!
//! ```ignore
//! use sra_core::{SraError, SraResult};
//!
//! fn study(path: &str) -> SraResult<()> {
//!     let network = load_system(path)?;
//!     network.ensure_valid()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all SRA operations.
///
/// Every variant is fatal for the study that raised it: the simulation has no
/// automatic retries, since transitions and dispatch solves are deterministic
/// given their random draws.
#[derive(Error, Debug)]
pub enum SraError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid study or network configuration, rejected before simulation starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed topology (dangling endpoints, duplicate ids)
    #[error("Topology error: {0}")]
    Topology(String),

    /// LP backend failure outside of the infeasible case
    #[error("Solver error: {0}")]
    Solver(String),

    /// The dispatch optimization found no solution despite the curtailment slack
    #[error("Dispatch infeasible in trial {trial}, hour {hour}: {reason}")]
    DispatchInfeasible {
        trial: usize,
        hour: usize,
        reason: String,
    },

    /// A worker did not report, panicked, or returned a malformed accumulator
    #[error("Worker {worker} failed: {reason}")]
    WorkerFailure { worker: usize, reason: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SraError.
pub type SraResult<T> = Result<T, SraError>;

impl SraError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SraError::Config(message.into())
    }

    /// Whether this error came from the parallel driver rather than the model.
    pub fn is_worker_failure(&self) -> bool {
        matches!(self, SraError::WorkerFailure { .. })
    }
}

impl From<anyhow::Error> for SraError {
    fn from(err: anyhow::Error) -> Self {
        SraError::Other(format!("{err:#}"))
    }
}
