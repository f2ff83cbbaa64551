//! Data-source adapter traits
//!
//! The engine never speaks SQL. It describes what it needs as a
//! [`QueryRequest`] and an adapter turns that into dialect-specific queries
//! over a connection, streaming [`RowBatch`]es of at most `chunksize` rows.

mod memory;

pub use memory::{ConnectionStats, MemorySource};

use std::fmt::Debug;

use async_trait::async_trait;
use futures::stream::BoxStream;
use kgmat_rml::{JoinCondition, LogicalTable, MaterializeResult};
use kgmat_tabular::RowBatch;

/// Stream of result batches for one query
pub type BatchStream = BoxStream<'static, MaterializeResult<RowBatch>>;

/// Provider of connections to named relational sources.
///
/// Shared by all partition workers. Each rule opens its own connection and
/// closes it once its query stream is drained; there is no pooling.
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Open a connection to the source called `source_name`.
    ///
    /// Unknown sources and connection failures are `DataSource` errors.
    async fn open(&self, source_name: &str) -> MaterializeResult<Box<dyn Connection>>;
}

/// One open connection.
#[async_trait]
pub trait Connection: Send {
    /// Run a query and stream its rows.
    async fn query(&mut self, request: QueryRequest) -> MaterializeResult<BatchStream>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> MaterializeResult<()>;
}

/// What to fetch and how to batch it
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub kind: QueryKind,
    /// Maximum rows per batch
    pub chunksize: usize,
    /// Deliver decimal columns as floating point
    pub coerce_float: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Columns of a single logical table, unprefixed
    Project(ProjectionQuery),
    /// Inner equi-join of two logical tables, `child_`/`parent_` prefixed
    Join(JoinQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionQuery {
    pub logical_table: LogicalTable,
    /// Sorted, distinct column names
    pub columns: Vec<String>,
}

/// Two-sided query backing a referencing object map.
///
/// The result has one row per matching (child, parent) pair. Rows with a
/// null in any join column never match.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinQuery {
    pub child_table: LogicalTable,
    pub parent_table: LogicalTable,
    /// Child columns to return, delivered as `child_<name>`
    pub child_columns: Vec<String>,
    /// Parent columns to return, delivered as `parent_<name>`
    pub parent_columns: Vec<String>,
    /// Conjunctive equality conditions
    pub conditions: Vec<JoinCondition>,
}
