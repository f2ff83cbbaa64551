//! RefObjectMap structures
//!
//! RefObjectMaps link a rule to the subjects generated by another triples
//! map, enabling joins across logical sources.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Reference to another triples map with join conditions
///
/// ```turtle
/// <#EmployeeMapping> rr:predicateObjectMap [
///     rr:predicate ex:department ;
///     rr:objectMap [
///         rr:parentTriplesMap <#DeptMapping> ;
///         rr:joinCondition [ rr:child "dept_id" ; rr:parent "id" ]
///     ]
/// ] .
/// ```
///
/// For each employee this yields a triple whose object is the subject of the
/// department row with a matching `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefObjectMap {
    /// Id of the parent triples map
    pub parent_triples_map: String,
    /// Conjunctive equality conditions, must be non-empty to materialize
    pub join_conditions: Vec<JoinCondition>,
}

impl RefObjectMap {
    /// Create a new RefObjectMap with a single join condition
    pub fn new(
        parent_triples_map: impl Into<String>,
        child_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            parent_triples_map: parent_triples_map.into(),
            join_conditions: vec![JoinCondition::new(child_column, parent_column)],
        }
    }

    /// Create a RefObjectMap with multiple join conditions (composite key)
    pub fn with_conditions(
        parent_triples_map: impl Into<String>,
        conditions: Vec<JoinCondition>,
    ) -> Self {
        Self {
            parent_triples_map: parent_triples_map.into(),
            join_conditions: conditions,
        }
    }

    /// Distinct child columns used in join conditions, sorted
    pub fn child_columns(&self) -> BTreeSet<&str> {
        self.join_conditions
            .iter()
            .map(|jc| jc.child_column.as_str())
            .collect()
    }

    /// Distinct parent columns used in join conditions, sorted
    pub fn parent_columns(&self) -> BTreeSet<&str> {
        self.join_conditions
            .iter()
            .map(|jc| jc.parent_column.as_str())
            .collect()
    }

    /// Check if this RefObjectMap has any join conditions
    pub fn has_conditions(&self) -> bool {
        !self.join_conditions.is_empty()
    }
}

/// A single join condition
///
/// The child column of the current rule's source must equal the parent
/// column of the parent triples map's source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinCondition {
    #[serde(alias = "child", alias = "child_value")]
    pub child_column: String,
    #[serde(alias = "parent", alias = "parent_value")]
    pub parent_column: String,
}

impl JoinCondition {
    /// Create a new join condition
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child_column: child.into(),
            parent_column: parent.into(),
        }
    }
}
