//! String template compiler
//!
//! A template such as `http://ex.org/{dept}/{id}` is parsed once into
//! literal text and column references. `\{`, `\}` and `\\` stand for the
//! literal characters.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MaterializeError, MaterializeResult};

/// Escapes, `{reference}` placeholders, and stray braces.
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[{}\\]|\{([^{}\\]*)\}|[{}]").expect("valid regex"));

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim into the output
    Literal(String),
    /// Column whose value is substituted
    Reference(String),
}

/// Compiled `rr:template` pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile a template pattern.
    ///
    /// Fails on an empty `{}` placeholder or an unmatched brace.
    pub fn parse(pattern: &str) -> MaterializeResult<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut last = 0;

        for cap in TOKEN_RE.captures_iter(pattern) {
            let Some(token) = cap.get(0) else { continue };
            text.push_str(&pattern[last..token.start()]);
            last = token.end();

            let matched = token.as_str();
            if let Some(escaped) = matched.strip_prefix('\\') {
                text.push_str(escaped);
            } else if let Some(reference) = cap.get(1) {
                if reference.as_str().is_empty() {
                    return Err(MaterializeError::Configuration(format!(
                        "empty placeholder at byte {} in template '{}'",
                        token.start(),
                        pattern
                    )));
                }
                if !text.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut text)));
                }
                segments.push(Segment::Reference(reference.as_str().to_string()));
            } else {
                return Err(MaterializeError::Configuration(format!(
                    "unmatched '{}' at byte {} in template '{}'",
                    matched,
                    token.start(),
                    pattern
                )));
            }
        }

        text.push_str(&pattern[last..]);
        if !text.is_empty() {
            segments.push(Segment::Literal(text));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    /// The source pattern
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Distinct referenced columns, in order of first occurrence.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Reference(name) = segment {
                if !refs.contains(&name.as_str()) {
                    refs.push(name);
                }
            }
        }
        refs
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
