//! Term and statement materialization
//!
//! Pure batch transforms: a [`kgmat_tabular::RowBatch`] goes in, rendered
//! terms or statement lines come out. Nothing here performs I/O.

mod rule;
mod term;

pub use rule::{render_batch, render_join_batch, render_rule_batch, TermRoles};
pub use term::{
    materialize_constant, materialize_reference, materialize_template, materialize_term,
    render_constant, TermColumn, TermKind,
};
