//! Literature retrieval across PubMed, bioRxiv, Scopus and Web of Science.
//! - Question → `SearchQuery` normalization
//! - Source adapters (PubMed, bioRxiv, Scopus, Web of Science)
//! - Per-adapter rate limiting and retry
//! - Concurrent fan-out under a deadline
//! - Cross-source deduplication into merged records

pub mod aggregator;
pub mod dedup;
pub mod query;
pub mod retry;
pub mod sources;

pub use aggregator::{AggregationReport, Aggregator, AggregatorConfig, SourceOutcome};
pub use dedup::{deduplicate, DedupConfig};
pub use query::QueryNormalizer;
pub use retry::{FetchError, RateLimiter, RetryPolicy};
pub use sources::{AdapterOptions, SourceAdapter};
