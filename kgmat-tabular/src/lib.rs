//! Columnar row batches for kgmat.
//!
//! This crate provides the batch type streamed by data-source adapters and
//! consumed by the term materializers in `kgmat-rml`.
//!
//! # Design
//!
//! - **Columnar storage**: Data is stored in typed `Vec` per column, not per-row
//! - **Strongly typed**: All column access is through the `Column` enum, no `dyn Any`
//! - **Names are canonical**: Columns are looked up by name; a missing column is
//!   an explicit error, never a silent null
//! - **Single coercion point**: [`Column::cell_as_string`] turns any cell into the
//!   string form used when rendering RDF terms

pub mod batch;
pub mod error;
pub mod role;

pub use batch::{BatchSchema, CellValue, Column, FieldInfo, FieldType, RowBatch};
pub use error::{Result, TabularError};
pub use role::ColumnRole;
