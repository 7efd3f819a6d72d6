//! Ferrobind evidence store
//!
//! Caches merged records and their extracted facts by canonical id, and keeps
//! the search history and question log.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferrobind_db::{EvidenceStore, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::open("./data/ferrobind-store.json", chrono::Duration::hours(24)).await?;
//!     for entry in store.recent_searches(10).await? {
//!         println!("{} {}", entry.searched_at, entry.keywords);
//!     }
//!     store.flush().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use schema::{QuestionLogEntry, SearchHistoryEntry, StoreKey, StoredValue};
pub use store::{EvidenceStore, MemoryStore, MAX_LOG_ENTRIES};
