//! Column roles for one- and two-sided batches.

use std::borrow::Cow;

/// Which side of a query a column reference belongs to.
///
/// Plain projections keep source column names as-is. Two-sided join batches
/// namespace every column with `child_` or `parent_` so that both logical
/// sources can share a column name without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnRole {
    /// Single-source batch, unprefixed names
    #[default]
    Plain,
    /// Child side of a join batch
    Child,
    /// Parent side of a join batch
    Parent,
}

impl ColumnRole {
    pub const CHILD_PREFIX: &'static str = "child_";
    pub const PARENT_PREFIX: &'static str = "parent_";

    /// Name prefix applied to columns of this role.
    pub fn prefix(&self) -> &'static str {
        match self {
            ColumnRole::Plain => "",
            ColumnRole::Child => Self::CHILD_PREFIX,
            ColumnRole::Parent => Self::PARENT_PREFIX,
        }
    }

    /// Qualify a logical column name with this role's prefix.
    pub fn qualify<'a>(&self, column: &'a str) -> Cow<'a, str> {
        match self {
            ColumnRole::Plain => Cow::Borrowed(column),
            _ => Cow::Owned(format!("{}{}", self.prefix(), column)),
        }
    }
}
