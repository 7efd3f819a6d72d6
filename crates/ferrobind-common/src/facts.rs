//! Structured facts pulled out of article text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::CanonicalId;

/// Categories of fact the extractor recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    TargetProtein,
    ExpressionSystem,
    PurificationMethod,
    Other,
}

impl FactKind {
    pub const ALL: [FactKind; 4] = [
        FactKind::TargetProtein,
        FactKind::ExpressionSystem,
        FactKind::PurificationMethod,
        FactKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::TargetProtein      => "target_protein",
            FactKind::ExpressionSystem   => "expression_system",
            FactKind::PurificationMethod => "purification_method",
            FactKind::Other              => "other",
        }
    }

    /// Heading used in synthesized answers.
    pub fn plural_label(&self) -> &'static str {
        match self {
            FactKind::TargetProtein      => "Target proteins",
            FactKind::ExpressionSystem   => "Expression systems",
            FactKind::PurificationMethod => "Purification methods",
            FactKind::Other              => "Other findings",
        }
    }

    /// Question words that signal interest in this kind of fact.
    pub fn cue_words(&self) -> &'static [&'static str] {
        match self {
            FactKind::TargetProtein => &[
                "target", "targets", "protein", "proteins", "receptor", "antigen", "binder",
                "binders", "binding", "pattern", "patterns",
            ],
            FactKind::ExpressionSystem => &[
                "expression", "expressed", "express", "system", "systems", "host", "hosts",
                "production", "produced", "recombinant",
            ],
            FactKind::PurificationMethod => &[
                "purification", "purified", "purify", "method", "methods", "chromatography",
                "isolation", "tag",
            ],
            FactKind::Other => &[
                "finding", "findings", "result", "results", "show", "conclusion", "evidence",
            ],
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte offsets `[start, end)` into the extraction text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One fact attributed to a merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFact {
    record_id: CanonicalId,
    kind: FactKind,
    value: String,
    confidence: f64,
    span: TextSpan,
    snippet: String,
}

impl ExtractedFact {
    /// Confidence is clamped to `[0, 1]`; NaN becomes 0.
    pub fn new(
        record_id: CanonicalId,
        kind: FactKind,
        value: impl Into<String>,
        confidence: f64,
        span: TextSpan,
        snippet: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            record_id,
            kind,
            value: value.into(),
            confidence,
            span,
            snippet: snippet.into(),
        }
    }

    pub fn record_id(&self) -> &CanonicalId { &self.record_id }
    pub fn kind(&self) -> FactKind { self.kind }
    pub fn value(&self) -> &str { &self.value }
    pub fn confidence(&self) -> f64 { self.confidence }
    pub fn span(&self) -> TextSpan { self.span }
    pub fn snippet(&self) -> &str { &self.snippet }

    /// Grouping key for "the same claim": kind plus case-folded value.
    pub fn claim_key(&self) -> (FactKind, String) {
        (self.kind, self.value.to_lowercase())
    }
}
