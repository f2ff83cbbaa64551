//! Execution engine for kgmat
//!
//! Drives validated mapping rules against relational sources and unions the
//! rendered statements into one deduplicated corpus.
//!
//! # Architecture
//!
//! - [`source`]: adapter traits ([`DataSource`], [`Connection`]) and the
//!   in-memory reference adapter [`MemorySource`]
//! - `execute`: one query per rule, joined for referencing object maps,
//!   rendered batch by batch
//! - [`partition`]: groups rules by partition and runs them on a bounded
//!   task pool with fail-fast semantics
//! - [`sink`]: receives each finished partition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kgmat_engine::{MaterializeConfig, Materializer, MemorySource};
//! use kgmat_rml::MappingRules;
//!
//! # async fn run(rules_json: &str, source: MemorySource) -> kgmat_engine::Result<()> {
//! let rules = MappingRules::from_json(rules_json)?;
//! let config = MaterializeConfig::default().with_processes(4);
//! let result = Materializer::new(Arc::new(source), config)
//!     .materialize(rules)
//!     .await?;
//! print!("{}", result.triples.to_nquads());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod execute;
pub mod partition;
pub mod sink;
pub mod source;

pub use config::MaterializeConfig;
pub use error::{EngineError, Result};
pub use partition::{
    group_partitions, materialize_set, Materialization, Materializer, PartitionReport,
};
pub use sink::{MemorySink, TripleSink};
pub use source::{
    BatchStream, Connection, ConnectionStats, DataSource, JoinQuery, MemorySource,
    ProjectionQuery, QueryKind, QueryRequest,
};
