//! Engine error types

use std::time::Duration;

use kgmat_rml::MaterializeError;
use thiserror::Error;

/// Errors from a materialization run
#[derive(Debug, Error)]
pub enum EngineError {
    /// A rule failed to materialize
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run exceeded its configured time limit
    #[error("Materialization timed out after {0:?}")]
    TimedOut(Duration),

    /// A partition task panicked or was cancelled
    #[error("Worker failure: {0}")]
    Worker(String),

    /// The output sink rejected a partition
    #[error("Sink error: {0}")]
    Sink(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
