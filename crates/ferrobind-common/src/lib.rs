//! ferrobind-common — Shared types, errors, and helpers used across all Ferrobind crates.

pub mod error;
pub mod records;
pub mod facts;
pub mod confidence;
pub mod sandbox;

// Re-export commonly used types
pub use error::{FerrobindError, Result};
pub use facts::{ExtractedFact, FactKind, TextSpan};
pub use records::{
    CanonicalId, DateRange, MergedRecord, RawRecord, SearchField, SearchQuery, SourceKind,
};
