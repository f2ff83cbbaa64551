//! Subject maps keyed by triples map id, used to resolve join parents.

use rustc_hash::FxHashMap;

use super::{LogicalTable, MappingRule, TermMap};
use crate::error::{MaterializeError, MaterializeResult};

/// Subject map of a triples map together with its logical source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectMapRule {
    pub triples_map_id: String,
    pub source_name: String,
    pub logical_table: LogicalTable,
    pub subject: TermMap,
}

impl From<&MappingRule> for SubjectMapRule {
    fn from(rule: &MappingRule) -> Self {
        Self {
            triples_map_id: rule.triples_map_id.clone(),
            source_name: rule.source_name.clone(),
            logical_table: rule.logical_table.clone(),
            subject: rule.subject.clone(),
        }
    }
}

impl SubjectMapRule {
    /// Sorted distinct columns of the subject map
    pub fn references(&self) -> Vec<&str> {
        let mut refs = self.subject.references();
        refs.sort_unstable();
        refs
    }
}

/// Immutable lookup of subject maps by triples map id.
///
/// Built once from the full rule table before any partition runs; workers
/// share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SubjectMapIndex {
    by_triples_map: FxHashMap<String, SubjectMapRule>,
}

impl SubjectMapIndex {
    /// Index the subject maps of `rules`. The first rule seen for a triples
    /// map provides its entry.
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a MappingRule>) -> Self {
        let mut by_triples_map = FxHashMap::default();
        for rule in rules {
            by_triples_map
                .entry(rule.triples_map_id.clone())
                .or_insert_with(|| SubjectMapRule::from(rule));
        }
        Self { by_triples_map }
    }

    pub fn get(&self, triples_map_id: &str) -> Option<&SubjectMapRule> {
        self.by_triples_map.get(triples_map_id)
    }

    /// Like [`get`](Self::get) but a missing entry is a join resolution error.
    pub fn resolve(&self, triples_map_id: &str) -> MaterializeResult<&SubjectMapRule> {
        self.get(triples_map_id).ok_or_else(|| {
            MaterializeError::JoinResolution(format!(
                "parent triples map '{}' not found",
                triples_map_id
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.by_triples_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_triples_map.is_empty()
    }
}
