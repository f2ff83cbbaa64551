//! Error types for tabular operations.

use thiserror::Error;

/// Errors from row batch operations.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Schema or structural error (column count mismatch, row count mismatch, etc.)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A column name was not present in the batch schema.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A non-null cell has no string rendering.
    #[error("Value at row {row} cannot be rendered as a string: {reason}")]
    NotCoercible { row: usize, reason: String },
}

/// Result type for tabular operations.
pub type Result<T> = std::result::Result<T, TabularError>;
