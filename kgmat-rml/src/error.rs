//! Materialization error types

use kgmat_tabular::TabularError;
use thiserror::Error;

/// Errors raised while rendering mapping rules into RDF statements.
///
/// None of these are retried. The first one aborts the owning rule and
/// its partition.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Malformed term map or rule, or a reference to a column the source
    /// does not have
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection or query failure, or a join request the source cannot serve
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Parent triples map referenced by a join is unknown
    #[error("Join resolution error: {0}")]
    JoinResolution(String),

    /// A cell is null or cannot be rendered as a string
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for materialization operations
pub type MaterializeResult<T> = Result<T, MaterializeError>;

impl From<TabularError> for MaterializeError {
    fn from(err: TabularError) -> Self {
        match err {
            TabularError::ColumnNotFound(column) => {
                MaterializeError::Configuration(format!("column not found: {}", column))
            }
            TabularError::NotCoercible { row, reason } => {
                MaterializeError::Encoding(format!("row {}: {}", row, reason))
            }
            TabularError::Schema(msg) => MaterializeError::DataSource(msg),
        }
    }
}
