//! RDF term materialization
//!
//! Each materializer renders one term map over a whole [`RowBatch`] and
//! returns one N-Triples term per row, each followed by a single space so
//! that terms can be concatenated into a statement.
//!
//! Encoding rules:
//!
//! - Template IRIs percent-encode every substituted byte outside the RFC 3986
//!   unreserved set. The template's own text is copied as-is, so `http://`
//!   in the pattern survives.
//! - Reference IRIs percent-encode the value but keep `:` and `/`, so a
//!   column holding a full IRI is emitted intact.
//! - Constant IRIs are emitted verbatim.
//! - Literal lexical forms escape `\`, `"`, LF and CR.

use std::borrow::Cow;

use kgmat_tabular::{CellValue, Column, ColumnRole, RowBatch};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{MaterializeError, MaterializeResult};
use crate::mapping::{Segment, Template, TermMap, TermType, TermValue};

/// Rendered terms for one batch, one per row
pub type TermColumn = Vec<String>;

/// Everything outside `A-Z a-z 0-9 - . _ ~`
const TEMPLATE_IRI_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Template set minus `:` and `/`
const REFERENCE_IRI_ESCAPE: &AsciiSet = &TEMPLATE_IRI_ESCAPE.remove(b':').remove(b'/');

/// How a rendered value is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind<'a> {
    /// `<value>`
    Iri,
    /// `"value"`, then `@language` or `^^<datatype>` or nothing
    Literal {
        language: Option<&'a str>,
        datatype: Option<&'a str>,
    },
}

impl<'a> TermKind<'a> {
    /// Wrapping for a term map. Language wins over datatype.
    pub fn of(term_map: &'a TermMap) -> MaterializeResult<Self> {
        match term_map.term_type {
            TermType::Iri => Ok(TermKind::Iri),
            TermType::Literal => Ok(TermKind::Literal {
                language: term_map.language.as_deref(),
                datatype: term_map.datatype.as_deref(),
            }),
            TermType::BlankNode => Err(MaterializeError::Configuration(
                "blank node term maps are not supported".to_string(),
            )),
        }
    }
}

/// Render any term map over `batch`, reading columns qualified by `role`.
pub fn materialize_term(
    term_map: &TermMap,
    batch: &RowBatch,
    role: ColumnRole,
) -> MaterializeResult<TermColumn> {
    let kind = TermKind::of(term_map)?;
    match &term_map.value {
        TermValue::Template(template) => materialize_template(template, kind, batch, role),
        TermValue::Reference(column) => materialize_reference(column, kind, batch, role),
        TermValue::Constant(value) => Ok(materialize_constant(value, kind, batch.num_rows)),
    }
}

enum Part<'b> {
    Text(&'b str),
    Cell { name: String, column: &'b Column },
}

/// Render a template for every row.
///
/// All referenced columns are resolved before any row is rendered, so a
/// missing column fails even on an empty batch.
pub fn materialize_template(
    template: &Template,
    kind: TermKind<'_>,
    batch: &RowBatch,
    role: ColumnRole,
) -> MaterializeResult<TermColumn> {
    let parts = template
        .segments()
        .iter()
        .map(|segment| -> MaterializeResult<Part> {
            match segment {
                Segment::Literal(text) => Ok(Part::Text(text)),
                Segment::Reference(reference) => {
                    let name = role.qualify(reference).into_owned();
                    let column = batch.require_column(&name)?;
                    Ok(Part::Cell { name, column })
                }
            }
        })
        .collect::<MaterializeResult<Vec<_>>>()?;

    let mut terms = Vec::with_capacity(batch.num_rows);
    let mut lexical = String::new();

    for row in batch.row_indices() {
        let mut term = String::with_capacity(template.as_str().len() + 8);
        match kind {
            TermKind::Iri => {
                term.push('<');
                for part in &parts {
                    match part {
                        Part::Text(text) => term.push_str(text),
                        Part::Cell { name, column } => term.extend(utf8_percent_encode(
                            &cell_text(column, name, row)?,
                            TEMPLATE_IRI_ESCAPE,
                        )),
                    }
                }
                term.push_str("> ");
            }
            TermKind::Literal { language, datatype } => {
                lexical.clear();
                for part in &parts {
                    match part {
                        Part::Text(text) => lexical.push_str(text),
                        Part::Cell { name, column } => {
                            lexical.push_str(&cell_text(column, name, row)?)
                        }
                    }
                }
                push_literal(&mut term, &lexical, language, datatype);
            }
        }
        terms.push(term);
    }

    Ok(terms)
}

/// Render a single column's value for every row.
pub fn materialize_reference(
    reference: &str,
    kind: TermKind<'_>,
    batch: &RowBatch,
    role: ColumnRole,
) -> MaterializeResult<TermColumn> {
    let name = role.qualify(reference);
    let column = batch.require_column(&name)?;

    batch
        .row_indices()
        .map(|row| -> MaterializeResult<String> {
            let value = cell_text(column, &name, row)?;
            let mut term = String::with_capacity(value.len() + 4);
            match kind {
                TermKind::Iri => {
                    term.push('<');
                    term.extend(utf8_percent_encode(&value, REFERENCE_IRI_ESCAPE));
                    term.push_str("> ");
                }
                TermKind::Literal { language, datatype } => {
                    push_literal(&mut term, &value, language, datatype)
                }
            }
            Ok(term)
        })
        .collect()
}

/// Render a constant once and repeat it for `num_rows` rows.
pub fn materialize_constant(value: &str, kind: TermKind<'_>, num_rows: usize) -> TermColumn {
    vec![render_constant(value, kind); num_rows]
}

/// A constant term with its trailing space.
pub fn render_constant(value: &str, kind: TermKind<'_>) -> String {
    let mut term = String::with_capacity(value.len() + 4);
    match kind {
        TermKind::Iri => {
            term.push('<');
            term.push_str(value);
            term.push_str("> ");
        }
        TermKind::Literal { language, datatype } => {
            push_literal(&mut term, value, language, datatype)
        }
    }
    term
}

fn cell_text<'b>(column: &'b Column, name: &str, row: usize) -> MaterializeResult<Cow<'b, str>> {
    match column.cell_as_string(row) {
        Ok(CellValue::Value(value)) => Ok(value),
        Ok(CellValue::Null) => Err(MaterializeError::Encoding(format!(
            "column '{}' row {} is null",
            name, row
        ))),
        Err(e) => Err(MaterializeError::Encoding(format!(
            "column '{}': {}",
            name, e
        ))),
    }
}

fn push_literal(out: &mut String, lexical: &str, language: Option<&str>, datatype: Option<&str>) {
    out.push('"');
    for c in lexical.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    if let Some(language) = language {
        out.push('@');
        out.push_str(language);
    } else if let Some(datatype) = datatype {
        out.push_str("^^<");
        out.push_str(datatype);
        out.push('>');
    }
    out.push(' ');
}
