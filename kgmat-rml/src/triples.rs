//! Deduplicating set of rendered statements

use rustc_hash::FxHashSet;

/// Set of rendered N-Triples / N-Quads lines.
///
/// Created empty per rule, unioned into its partition's set and then into
/// the corpus. Exact duplicate lines collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleSet {
    statements: FxHashSet<String>,
}

impl TripleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a statement. Returns `false` if it was already present.
    pub fn insert(&mut self, statement: String) -> bool {
        self.statements.insert(statement)
    }

    /// Union of two sets. The larger one absorbs the smaller.
    pub fn union(self, other: TripleSet) -> TripleSet {
        let (mut large, small) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        large.statements.extend(small.statements);
        large
    }

    /// Merge `other` into this set in place.
    pub fn merge(&mut self, other: TripleSet) {
        let current = std::mem::take(self);
        *self = current.union(other);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn contains(&self, statement: &str) -> bool {
        self.statements.contains(statement)
    }

    /// Statements in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.statements.iter().map(String::as_str)
    }

    /// Statements in lexicographic order
    pub fn into_sorted_vec(self) -> Vec<String> {
        let mut statements: Vec<String> = self.statements.into_iter().collect();
        statements.sort_unstable();
        statements
    }

    /// N-Quads document: sorted statements, each terminated by a newline.
    pub fn to_nquads(&self) -> String {
        let mut sorted: Vec<&str> = self.iter().collect();
        sorted.sort_unstable();
        let mut doc = String::with_capacity(sorted.iter().map(|s| s.len() + 1).sum());
        for statement in sorted {
            doc.push_str(statement);
            doc.push('\n');
        }
        doc
    }
}

impl Extend<String> for TripleSet {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl FromIterator<String> for TripleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TripleSet {
    type Item = String;
    type IntoIter = std::collections::hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}
