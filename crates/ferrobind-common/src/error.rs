use thiserror::Error;

use crate::records::SourceKind;

#[derive(Debug, Error)]
pub enum FerrobindError {
    /// Empty or malformed question. Fatal: no pipeline run happens.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A single source failed after its retry budget. Never fatal to a run.
    #[error("Source {kind} unavailable: {reason}")]
    SourceUnavailable { kind: SourceKind, reason: String },

    /// The aggregation deadline elapsed before any source answered.
    #[error("Aggregation timed out after {deadline_ms} ms with no source responding")]
    AggregationTimeout { deadline_ms: u64 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sandbox violation: {0}")]
    Security(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FerrobindError {
    pub fn source_unavailable(kind: SourceKind, reason: impl Into<String>) -> Self {
        FerrobindError::SourceUnavailable { kind, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, FerrobindError>;
