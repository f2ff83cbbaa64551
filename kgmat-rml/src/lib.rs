//! RML/R2RML mapping rules and term materialization for kgmat
//!
//! This crate turns validated mapping rules and columnar row batches into
//! N-Triples / N-Quads statement lines. It performs no I/O: querying sources
//! and scheduling rules live in `kgmat-engine`.
//!
//! # Key Features
//!
//! - **Template compiler**: `rr:template` patterns are parsed once into
//!   literal and reference segments
//! - **Term materialization**: template, reference and constant term maps
//!   rendered per batch with IRI percent-encoding and literal quoting
//! - **Join rendering**: objects taken from a parent triples map's subject
//!   over `child_`/`parent_` prefixed joined batches
//! - **Set semantics**: [`TripleSet`] deduplicates rendered statements
//!
//! # Usage
//!
//! Load rules with [`MappingRules::from_json`], build a [`SubjectMapIndex`]
//! for join parents, then render batches with [`render_rule_batch`] or
//! [`render_join_batch`].

pub mod error;
pub mod mapping;
pub mod materialize;
pub mod triples;
pub mod vocab;

pub use error::{MaterializeError, MaterializeResult};
pub use mapping::{
    JoinCondition, LogicalTable, MappingRule, MappingRuleRecord, MappingRules, ObjectMap,
    RefObjectMap, SubjectMapIndex, SubjectMapRule, Template, TermMap, TermMapRecord, TermType,
    TermValue,
};
pub use materialize::{
    materialize_term, render_batch, render_join_batch, render_rule_batch, TermKind, TermRoles,
};
pub use triples::TripleSet;
pub use vocab::{R2RML, RML};
