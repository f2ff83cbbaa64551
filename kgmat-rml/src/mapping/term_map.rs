//! Term map structures
//!
//! Term maps define how one RDF term of a statement is generated from a row.

use serde::{Deserialize, Serialize};

use super::Template;
use crate::error::{MaterializeError, MaterializeResult};
use crate::vocab::{self, R2RML, RML};

/// Term type
///
/// Specifies whether a term map generates IRIs, blank nodes, or literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TermType {
    /// Generate an IRI (default for subject, predicate and graph maps)
    #[default]
    Iri,
    /// Generate a blank node
    BlankNode,
    /// Generate a literal
    Literal,
}

impl TermType {
    /// Parse term type from an R2RML or RML IRI
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            R2RML::IRI | RML::IRI => Some(TermType::Iri),
            R2RML::BLANK_NODE | RML::BLANK_NODE => Some(TermType::BlankNode),
            R2RML::LITERAL | RML::LITERAL => Some(TermType::Literal),
            _ => None,
        }
    }

    /// Check if this term type produces IRIs
    pub fn is_iri(&self) -> bool {
        matches!(self, TermType::Iri)
    }

    /// Check if this term type produces literals
    pub fn is_literal(&self) -> bool {
        matches!(self, TermType::Literal)
    }
}

/// Position of a term map within a statement.
///
/// Decides the default term type and which term types are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermPosition {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl TermPosition {
    fn default_term_type(&self, record: &TermMapRecord) -> TermType {
        match self {
            TermPosition::Object
                if record.reference.is_some()
                    || record.language.is_some()
                    || record.datatype.is_some() =>
            {
                TermType::Literal
            }
            _ => TermType::Iri,
        }
    }

    fn allows(&self, term_type: TermType) -> bool {
        match self {
            TermPosition::Subject => !term_type.is_literal(),
            TermPosition::Predicate | TermPosition::Graph => term_type.is_iri(),
            TermPosition::Object => true,
        }
    }
}

/// Where a term's value comes from. Exactly one per term map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermValue {
    /// `rr:template` - interpolated from one or more columns
    Template(Template),
    /// `rr:column` / `rml:reference` - a single column value
    Reference(String),
    /// `rr:constant` - the same value for every row
    Constant(String),
}

/// Compiled term map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMap {
    pub value: TermValue,
    pub term_type: TermType,
    /// Language tag (literals only)
    pub language: Option<String>,
    /// Datatype IRI (literals only)
    pub datatype: Option<String>,
}

impl TermMap {
    /// Create a term map, rejecting a language tag combined with a datatype.
    pub fn new(
        value: TermValue,
        term_type: TermType,
        language: Option<String>,
        datatype: Option<String>,
    ) -> MaterializeResult<Self> {
        if language.is_some() && datatype.is_some() {
            return Err(MaterializeError::Configuration(
                "term map cannot have both a language tag and a datatype".to_string(),
            ));
        }
        Ok(Self {
            value,
            term_type,
            language,
            datatype,
        })
    }

    /// Template term map
    pub fn template(pattern: &str, term_type: TermType) -> MaterializeResult<Self> {
        Ok(Self::plain(
            TermValue::Template(Template::parse(pattern)?),
            term_type,
        ))
    }

    /// Column reference term map
    pub fn reference(column: impl Into<String>, term_type: TermType) -> Self {
        Self::plain(TermValue::Reference(column.into()), term_type)
    }

    /// Constant term map
    pub fn constant(value: impl Into<String>, term_type: TermType) -> Self {
        Self::plain(TermValue::Constant(value.into()), term_type)
    }

    /// Constant IRI term map, the usual shape of a predicate map
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::constant(iri, TermType::Iri)
    }

    fn plain(value: TermValue, term_type: TermType) -> Self {
        Self {
            value,
            term_type,
            language: None,
            datatype: None,
        }
    }

    /// Set the language tag.
    pub fn with_language(self, language: impl Into<String>) -> MaterializeResult<Self> {
        Self::new(self.value, self.term_type, Some(language.into()), self.datatype)
    }

    /// Set the datatype IRI.
    pub fn with_datatype(self, datatype: impl Into<String>) -> MaterializeResult<Self> {
        Self::new(self.value, self.term_type, self.language, Some(datatype.into()))
    }

    /// Columns this term map reads, in order of first occurrence.
    pub fn references(&self) -> Vec<&str> {
        match &self.value {
            TermValue::Template(t) => t.references(),
            TermValue::Reference(column) => vec![column.as_str()],
            TermValue::Constant(_) => vec![],
        }
    }

    /// Constant graph map naming the default graph.
    pub fn is_default_graph(&self) -> bool {
        match &self.value {
            TermValue::Constant(c) => vocab::is_default_graph(c),
            _ => false,
        }
    }
}

/// Term map as produced by the upstream mapping parser.
///
/// All fields are optional; exactly one of `template`, `reference` and
/// `constant` must be set for a term map to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermMapRecord {
    pub template: Option<String>,
    #[serde(alias = "column")]
    pub reference: Option<String>,
    pub constant: Option<String>,
    #[serde(alias = "termtype")]
    pub term_type: Option<String>,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl TermMapRecord {
    /// Whether none of template/reference/constant is set.
    pub fn is_empty(&self) -> bool {
        self.template.is_none() && self.reference.is_none() && self.constant.is_none()
    }

    /// Compile this record for the given statement position.
    pub fn into_term_map(self, position: TermPosition) -> MaterializeResult<TermMap> {
        let term_type = match self.term_type.as_deref() {
            Some(iri) => TermType::from_iri(iri.trim()).ok_or_else(|| {
                MaterializeError::Configuration(format!("unknown term type: {}", iri))
            })?,
            None => position.default_term_type(&self),
        };
        if !position.allows(term_type) {
            return Err(MaterializeError::Configuration(format!(
                "{:?} term type is not allowed in {:?} position",
                term_type, position
            )));
        }

        let value = match (self.template, self.reference, self.constant) {
            (Some(t), None, None) => TermValue::Template(Template::parse(&t)?),
            (None, Some(r), None) => TermValue::Reference(r),
            (None, None, Some(c)) => TermValue::Constant(c),
            (None, None, None) => {
                return Err(MaterializeError::Configuration(format!(
                    "{:?} term map has none of template, reference or constant",
                    position
                )))
            }
            _ => {
                return Err(MaterializeError::Configuration(format!(
                    "{:?} term map has more than one of template, reference or constant",
                    position
                )))
            }
        };

        TermMap::new(value, term_type, self.language, self.datatype)
    }
}

impl TryFrom<TermMapRecord> for TermMap {
    type Error = MaterializeError;

    /// Compiles the record with object-position defaults.
    fn try_from(record: TermMapRecord) -> MaterializeResult<Self> {
        record.into_term_map(TermPosition::Object)
    }
}
