//! Mapping rules
//!
//! A mapping rule is one flattened subject/predicate/object(/graph)
//! combination of a triples map, with the logical source it reads from and
//! the partition it was assigned to upstream.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{JoinCondition, RefObjectMap, TermMap, TermMapRecord, TermPosition};
use crate::error::{MaterializeError, MaterializeResult};

/// Logical source of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalTable {
    /// `rr:tableName`
    Table(String),
    /// `rr:sqlQuery`
    SqlQuery(String),
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalTable::Table(name) => write!(f, "table {}", name),
            LogicalTable::SqlQuery(query) => write!(f, "query ({})", query),
        }
    }
}

/// Object slot of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectMap {
    /// Object rendered from this rule's own row
    Term(TermMap),
    /// Object is the subject of a parent triples map, found by joining
    Reference(RefObjectMap),
}

impl ObjectMap {
    /// Get the RefObjectMap if this is a reference
    pub fn as_ref_object_map(&self) -> Option<&RefObjectMap> {
        match self {
            ObjectMap::Reference(rom) => Some(rom),
            ObjectMap::Term(_) => None,
        }
    }
}

/// One validated mapping rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub rule_id: String,
    pub triples_map_id: String,
    /// Name of the data source holding `logical_table`
    pub source_name: String,
    pub logical_table: LogicalTable,
    /// Partition assigned upstream; opaque here
    pub partition_id: String,
    pub subject: TermMap,
    pub predicate: TermMap,
    pub object: ObjectMap,
    /// Named graph; `None` for the default graph
    pub graph: Option<TermMap>,
}

impl MappingRule {
    /// Check if the object is produced by a join
    pub fn is_join(&self) -> bool {
        matches!(self.object, ObjectMap::Reference(_))
    }

    /// Columns this rule reads from its own logical source, sorted and distinct.
    ///
    /// For join rules these are the child-side columns: subject, predicate
    /// and graph references plus the child join columns.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut refs: BTreeSet<&str> = self.subject.references().into_iter().collect();
        refs.extend(self.predicate.references());
        if let Some(graph) = &self.graph {
            refs.extend(graph.references());
        }
        match &self.object {
            ObjectMap::Term(tm) => refs.extend(tm.references()),
            ObjectMap::Reference(rom) => refs.extend(rom.child_columns()),
        }
        refs
    }
}

/// Rule as produced by the upstream mapping parser
///
/// Join conditions arrive as a structured list of column pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingRuleRecord {
    #[serde(alias = "id")]
    pub rule_id: String,
    pub triples_map_id: String,
    pub source_name: String,
    pub table_name: Option<String>,
    pub sql_query: Option<String>,
    pub partition_id: String,
    pub subject: TermMapRecord,
    pub predicate: TermMapRecord,
    pub object: TermMapRecord,
    #[serde(alias = "object_parent_triples_map")]
    pub parent_triples_map: Option<String>,
    pub join_conditions: Vec<JoinCondition>,
    pub graph: TermMapRecord,
}

impl TryFrom<MappingRuleRecord> for MappingRule {
    type Error = MaterializeError;

    fn try_from(record: MappingRuleRecord) -> MaterializeResult<Self> {
        let rule_id = record.rule_id;
        let context = |msg: String| {
            MaterializeError::Configuration(format!("rule '{}': {}", rule_id, msg))
        };

        if record.triples_map_id.is_empty() {
            return Err(context("missing triples map id".to_string()));
        }

        let logical_table = match (record.table_name, record.sql_query) {
            (Some(name), None) => LogicalTable::Table(name),
            (None, Some(query)) => LogicalTable::SqlQuery(query),
            (None, None) => return Err(context("missing logical table".to_string())),
            (Some(_), Some(_)) => {
                return Err(context(
                    "logical table has both a table name and a query".to_string(),
                ))
            }
        };

        let subject = record
            .subject
            .into_term_map(TermPosition::Subject)
            .map_err(|e| context(e.to_string()))?;
        let predicate = record
            .predicate
            .into_term_map(TermPosition::Predicate)
            .map_err(|e| context(e.to_string()))?;

        let object = match record.parent_triples_map {
            Some(parent) => {
                if !record.object.is_empty() {
                    return Err(context(
                        "object has both a term map and a parent triples map".to_string(),
                    ));
                }
                if record.join_conditions.is_empty() {
                    return Err(context(format!(
                        "reference to '{}' has no join conditions",
                        parent
                    )));
                }
                ObjectMap::Reference(RefObjectMap::with_conditions(
                    parent,
                    record.join_conditions,
                ))
            }
            None => {
                if !record.join_conditions.is_empty() {
                    return Err(context(
                        "join conditions without a parent triples map".to_string(),
                    ));
                }
                ObjectMap::Term(
                    record
                        .object
                        .into_term_map(TermPosition::Object)
                        .map_err(|e| context(e.to_string()))?,
                )
            }
        };

        let graph = if record.graph.is_empty() {
            None
        } else {
            Some(
                record
                    .graph
                    .into_term_map(TermPosition::Graph)
                    .map_err(|e| context(e.to_string()))?,
            )
            .filter(|g| !g.is_default_graph())
        };

        Ok(MappingRule {
            rule_id,
            triples_map_id: record.triples_map_id,
            source_name: record.source_name,
            logical_table,
            partition_id: record.partition_id,
            subject,
            predicate,
            object,
            graph,
        })
    }
}

/// Validated rule table
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    rules: Vec<MappingRule>,
}

impl MappingRules {
    pub fn new(rules: Vec<MappingRule>) -> Self {
        Self { rules }
    }

    /// Validate upstream records.
    pub fn from_records(
        records: impl IntoIterator<Item = MappingRuleRecord>,
    ) -> MaterializeResult<Self> {
        let rules = records
            .into_iter()
            .map(MappingRule::try_from)
            .collect::<MaterializeResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Load a JSON array of rule records.
    pub fn from_json(json: &str) -> MaterializeResult<Self> {
        let records: Vec<MappingRuleRecord> = serde_json::from_str(json).map_err(|e| {
            MaterializeError::Configuration(format!("invalid mapping rule JSON: {}", e))
        })?;
        Self::from_records(records)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappingRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn as_slice(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn into_vec(self) -> Vec<MappingRule> {
        self.rules
    }
}

impl IntoIterator for MappingRules {
    type Item = MappingRule;
    type IntoIter = std::vec::IntoIter<MappingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

impl<'a> IntoIterator for &'a MappingRules {
    type Item = &'a MappingRule;
    type IntoIter = std::slice::Iter<'a, MappingRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl FromIterator<MappingRule> for MappingRules {
    fn from_iter<I: IntoIterator<Item = MappingRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{TermType, TermValue};
    use crate::vocab::R2RML;

    const RULES: &str = r##"[
        {
            "rule_id": "r1",
            "triples_map_id": "#Person",
            "source_name": "db",
            "table_name": "people",
            "partition_id": "0",
            "subject": {"template": "http://ex.org/{id}"},
            "predicate": {"constant": "http://ex.org/name"},
            "object": {"reference": "name", "language": "en"}
        },
        {
            "rule_id": "r2",
            "triples_map_id": "#Person",
            "source_name": "db",
            "table_name": "people",
            "partition_id": "1",
            "subject": {"template": "http://ex.org/{id}"},
            "predicate": {"constant": "http://ex.org/dept"},
            "parent_triples_map": "#Dept",
            "join_conditions": [{"child": "dept_id", "parent": "id"}],
            "graph": {"constant": "http://www.w3.org/ns/r2rml#defaultGraph"}
        }
    ]"##;

    #[test]
    fn test_from_json() {
        let rules = MappingRules::from_json(RULES).unwrap();
        assert_eq!(rules.len(), 2);

        let r1 = &rules.as_slice()[0];
        assert_eq!(r1.logical_table, LogicalTable::Table("people".into()));
        assert_eq!(r1.subject.term_type, TermType::Iri);
        assert_eq!(r1.predicate.value, TermValue::Constant("http://ex.org/name".into()));
        match &r1.object {
            ObjectMap::Term(tm) => {
                assert_eq!(tm.term_type, TermType::Literal);
                assert_eq!(tm.language.as_deref(), Some("en"));
            }
            other => panic!("unexpected object map: {:?}", other),
        }
        assert!(!r1.is_join());

        let r2 = &rules.as_slice()[1];
        assert!(r2.is_join());
        assert!(r2.graph.is_none(), "default graph is dropped");
        assert_eq!(
            r2.object.as_ref_object_map().unwrap().parent_triples_map,
            "#Dept"
        );
    }

    #[test]
    fn test_references() {
        let rules = MappingRules::from_json(RULES).unwrap();
        let plain: Vec<_> = rules.as_slice()[0].references().into_iter().collect();
        assert_eq!(plain, vec!["id", "name"]);

        let join: Vec<_> = rules.as_slice()[1].references().into_iter().collect();
        assert_eq!(join, vec!["dept_id", "id"]);
    }

    #[test]
    fn test_missing_predicate_rejected() {
        let record = MappingRuleRecord {
            rule_id: "bad".into(),
            triples_map_id: "#T".into(),
            table_name: Some("t".into()),
            subject: TermMapRecord {
                constant: Some("http://ex.org/s".into()),
                ..Default::default()
            },
            object: TermMapRecord {
                constant: Some("o".into()),
                term_type: Some(R2RML::LITERAL.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = MappingRule::try_from(record).unwrap_err();
        assert!(matches!(err, MaterializeError::Configuration(m) if m.contains("'bad'")));
    }

    #[test]
    fn test_join_without_conditions_rejected() {
        let record = MappingRuleRecord {
            rule_id: "j".into(),
            triples_map_id: "#T".into(),
            table_name: Some("t".into()),
            subject: TermMapRecord {
                template: Some("http://ex.org/{id}".into()),
                ..Default::default()
            },
            predicate: TermMapRecord {
                constant: Some("http://ex.org/p".into()),
                ..Default::default()
            },
            parent_triples_map: Some("#P".into()),
            ..Default::default()
        };
        assert!(MappingRule::try_from(record).is_err());
    }

    #[test]
    fn test_logical_table_required() {
        let record = MappingRuleRecord {
            rule_id: "t".into(),
            triples_map_id: "#T".into(),
            ..Default::default()
        };
        let err = MappingRule::try_from(record).unwrap_err();
        assert!(err.to_string().contains("logical table"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            MappingRules::from_json("{not json"),
            Err(MaterializeError::Configuration(_))
        ));
    }
}
