//! Pulling numeric fields out of the raw output of a run.
//!
//! Every rule is independent: a rule that does not match marks its field absent, a literal that
//! does not parse marks it absent and records an [`ExtractionGap::Coercion`]. Extraction itself
//! never fails, so a truncated or crashed run still yields whatever it printed.

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::results::Scalar;

/// Numeric type of an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Parsed as `i64`.
    Int,
    /// Parsed as `f64`.
    Float,
}

/// A declared field that could not be extracted from one run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionGap {
    /// No line matched the rule.
    #[error("field '{field}' not found")]
    Missing {
        /// Field name.
        field: String,
    },

    /// A line matched but its literal is not a number of the declared kind.
    #[error("field '{field}': cannot read '{literal}' as {kind:?}")]
    Coercion {
        /// Field name.
        field: String,
        /// Captured text.
        literal: String,
        /// Declared kind.
        kind: FieldKind,
    },
}

#[derive(Debug, Clone)]
struct ExtractionRule {
    field: String,
    pattern: Regex,
    kind: FieldKind,
}

/// Fields extracted from one run, and what could not be.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Every declared field, `None` when absent.
    pub fields: BTreeMap<String, Option<Scalar>>,
    /// One entry per absent field.
    pub gaps: Vec<ExtractionGap>,
}

/// A set of extraction rules.
#[derive(Debug, Clone, Default)]
pub struct OutputExtractor {
    rules: Vec<ExtractionRule>,
}

impl OutputExtractor {
    /// Extractor without rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the Carcassonne solver: points and contemplation time of both players.
    ///
    /// # Errors
    /// Never in practice: the patterns are constants.
    pub fn carcassonne() -> Result<Self, regex::Error> {
        Self::new()
            .with_rule("p1_points", r"P1 points: (\d+)", FieldKind::Int)?
            .with_rule("p2_points", r"P2 points: (\d+)", FieldKind::Int)?
            .with_rule(
                "p1_contemplation_time",
                r"P1 contemplation time in seconds: (.+)",
                FieldKind::Float,
            )?
            .with_rule(
                "p2_contemplation_time",
                r"P2 contemplation time in seconds: (.+)",
                FieldKind::Float,
            )
    }

    /// Declare `field`, read from the first capture group of `pattern` (or the whole match if
    /// the pattern has no group). Only the first match counts.
    ///
    /// # Errors
    /// When `pattern` is not a valid regex.
    pub fn with_rule(
        mut self,
        field: impl Into<String>,
        pattern: &str,
        kind: FieldKind,
    ) -> Result<Self, regex::Error> {
        self.rules.push(ExtractionRule {
            field: field.into(),
            pattern: Regex::new(pattern)?,
            kind,
        });
        Ok(self)
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.field.as_str())
    }

    /// Apply every rule to `raw`. `run` only names the run in logs.
    pub fn extract(&self, run: &str, raw: &str) -> Extraction {
        let mut extraction = Extraction::default();
        for rule in &self.rules {
            let value = match rule.pattern.captures(raw) {
                None => {
                    debug!(run, field = %rule.field, "field not found");
                    extraction.gaps.push(ExtractionGap::Missing {
                        field: rule.field.clone(),
                    });
                    None
                }
                Some(caps) => {
                    let literal = caps.get(1).or_else(|| caps.get(0)).map_or("", |m| m.as_str());
                    let parsed = match rule.kind {
                        FieldKind::Int => literal.trim().parse().ok().map(Scalar::Int),
                        FieldKind::Float => literal.trim().parse().ok().map(Scalar::Float),
                    };
                    if parsed.is_none() {
                        let gap = ExtractionGap::Coercion {
                            field: rule.field.clone(),
                            literal: literal.to_owned(),
                            kind: rule.kind,
                        };
                        warn!(run, "{gap}");
                        extraction.gaps.push(gap);
                    }
                    parsed
                }
            };
            extraction.fields.insert(rule.field.clone(), value);
        }
        extraction
    }
}
