//! Mapping rule structures
//!
//! Compiled, validated form of the rule records handed over by the upstream
//! mapping parser. Used by the materializers and the execution engine.

mod ref_object_map;
mod rule;
mod subject_index;
mod template;
mod term_map;

pub use ref_object_map::{JoinCondition, RefObjectMap};
pub use rule::{LogicalTable, MappingRule, MappingRuleRecord, MappingRules, ObjectMap};
pub use subject_index::{SubjectMapIndex, SubjectMapRule};
pub use template::{Segment, Template};
pub use term_map::{TermMap, TermMapRecord, TermPosition, TermType, TermValue};
