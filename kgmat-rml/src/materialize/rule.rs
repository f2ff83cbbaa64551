//! Statement rendering
//!
//! Composes the term columns of a rule into N-Triples / N-Quads lines.

use kgmat_tabular::{ColumnRole, RowBatch};

use super::term::materialize_term;
use crate::error::{MaterializeError, MaterializeResult};
use crate::mapping::{MappingRule, ObjectMap, SubjectMapRule, TermMap};

/// Column side read by each term of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermRoles {
    pub subject: ColumnRole,
    pub predicate: ColumnRole,
    pub object: ColumnRole,
    pub graph: ColumnRole,
}

impl TermRoles {
    /// Single-source batch
    pub const PLAIN: Self = Self {
        subject: ColumnRole::Plain,
        predicate: ColumnRole::Plain,
        object: ColumnRole::Plain,
        graph: ColumnRole::Plain,
    };

    /// Joined batch: the object comes from the parent side
    pub const JOIN: Self = Self {
        subject: ColumnRole::Child,
        predicate: ColumnRole::Child,
        object: ColumnRole::Parent,
        graph: ColumnRole::Child,
    };
}

/// Render one statement per row of `batch`.
///
/// Lines look like `<s> <p> "o" .` or, with a named graph, `<s> <p> "o" <g> .`.
pub fn render_batch(
    subject: &TermMap,
    predicate: &TermMap,
    object: &TermMap,
    graph: Option<&TermMap>,
    batch: &RowBatch,
    roles: TermRoles,
) -> MaterializeResult<Vec<String>> {
    let mut lines = materialize_term(subject, batch, roles.subject)?;
    let predicates = materialize_term(predicate, batch, roles.predicate)?;
    let objects = materialize_term(object, batch, roles.object)?;
    let graphs = match graph.filter(|g| !g.is_default_graph()) {
        Some(g) => Some(materialize_term(g, batch, roles.graph)?),
        None => None,
    };

    for (row, line) in lines.iter_mut().enumerate() {
        line.push_str(&predicates[row]);
        line.push_str(&objects[row]);
        if let Some(graphs) = &graphs {
            line.push_str(&graphs[row]);
        }
        line.push('.');
    }

    Ok(lines)
}

/// Render a batch of a rule whose object is its own term map.
pub fn render_rule_batch(rule: &MappingRule, batch: &RowBatch) -> MaterializeResult<Vec<String>> {
    match &rule.object {
        ObjectMap::Term(object) => render_batch(
            &rule.subject,
            &rule.predicate,
            object,
            rule.graph.as_ref(),
            batch,
            TermRoles::PLAIN,
        ),
        ObjectMap::Reference(_) => Err(MaterializeError::Configuration(format!(
            "rule '{}' references a parent triples map and needs a joined batch",
            rule.rule_id
        ))),
    }
}

/// Render a joined batch: subject, predicate and graph from the child
/// columns, object from the parent's subject map over the parent columns.
pub fn render_join_batch(
    rule: &MappingRule,
    parent: &SubjectMapRule,
    batch: &RowBatch,
) -> MaterializeResult<Vec<String>> {
    render_batch(
        &rule.subject,
        &rule.predicate,
        &parent.subject,
        rule.graph.as_ref(),
        batch,
        TermRoles::JOIN,
    )
}
