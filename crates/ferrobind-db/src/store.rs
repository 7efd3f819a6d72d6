//! Evidence store trait and the in-memory implementation.
//!
//! `MemoryStore` keeps everything behind a tokio `RwLock`. When opened on a
//! path it loads a JSON snapshot at startup and writes one back on `flush`,
//! so search history survives between CLI runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ferrobind_common::{ExtractedFact, FactKind};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::schema::{QuestionLogEntry, SearchHistoryEntry, StoreKey, StoredValue};

/// Persistence seam for merged records, extracted facts and run logs.
/// Writes are last-write-wins and idempotent per key.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// The value under `key`, or `None` when absent or expired.
    async fn get(&self, key: &StoreKey) -> Result<Option<StoredValue>>;

    async fn put(&self, key: StoreKey, value: StoredValue) -> Result<()>;

    /// Every unexpired stored fact of `kind`, ordered by record id then span.
    async fn query_by_fact_kind(&self, kind: FactKind) -> Result<Vec<ExtractedFact>>;

    async fn record_search(&self, entry: SearchHistoryEntry) -> Result<()>;

    /// Newest first.
    async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>>;

    async fn log_question(&self, entry: QuestionLogEntry) -> Result<()>;

    /// Newest first.
    async fn recent_questions(&self, limit: usize) -> Result<Vec<QuestionLogEntry>>;

    /// Persist pending writes, if the backend has anywhere to put them.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

const SNAPSHOT_VERSION: u32 = 1;

/// Search history and question log keep at most this many entries each;
/// the oldest are dropped first.
pub const MAX_LOG_ENTRIES: usize = 1000;

fn push_capped<T>(log: &mut Vec<T>, entry: T) {
    log.push(entry);
    if log.len() > MAX_LOG_ENTRIES {
        let excess = log.len() - MAX_LOG_ENTRIES;
        log.drain(..excess);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: StoredValue,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<StoreKey, Entry>,
    searches: Vec<SearchHistoryEntry>,
    questions: Vec<QuestionLogEntry>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<(StoreKey, Entry)>,
    searches: Vec<SearchHistoryEntry>,
    questions: Vec<QuestionLogEntry>,
}

pub struct MemoryStore {
    state: RwLock<State>,
    ttl: Duration,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Entries older than `ttl` read as absent.
    pub fn new(ttl: Duration) -> Self {
        Self { state: RwLock::new(State::default()), ttl, path: None }
    }

    /// Load the snapshot at `path` if it exists; `flush` writes back to it.
    pub async fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StoreError::UnsupportedSnapshot { expected: SNAPSHOT_VERSION, found: snapshot.version });
                }
                info!(path = %path.display(), entries = snapshot.entries.len(), "Store snapshot loaded");
                State {
                    entries: snapshot.entries.into_iter().collect(),
                    searches: snapshot.searches,
                    questions: snapshot.questions,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { state: RwLock::new(state), ttl, path: Some(path) })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Write the snapshot, dropping expired entries. No-op for purely
    /// in-memory stores.
    pub async fn write_snapshot(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        let now = Utc::now();
        let snapshot = {
            let state = self.state.read().await;
            let mut entries: Vec<(StoreKey, Entry)> = state
                .entries
                .iter()
                .filter(|(_, e)| !self.is_expired(e, now))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Snapshot {
                version: SNAPSHOT_VERSION,
                entries,
                searches: state.searches.clone(),
                questions: state.questions.clone(),
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&snapshot)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), entries = snapshot.entries.len(), "Store snapshot written");
        Ok(())
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|_, e| !self.is_expired(e, now));
        before - state.entries.len()
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.stored_at >= self.ttl
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

#[async_trait]
impl EvidenceStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<StoredValue>> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(state
            .entries
            .get(key)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: StoreKey, value: StoredValue) -> Result<()> {
        let shape_ok = matches!(
            (&key, &value),
            (StoreKey::Record(_), StoredValue::Record(_)) | (StoreKey::Facts(_), StoredValue::Facts(_))
        );
        if !shape_ok {
            return Err(StoreError::WrongShape { key: key.to_string() });
        }
        let mut state = self.state.write().await;
        state.entries.insert(key, Entry { value, stored_at: Utc::now() });
        Ok(())
    }

    async fn query_by_fact_kind(&self, kind: FactKind) -> Result<Vec<ExtractedFact>> {
        let state = self.state.read().await;
        let now = Utc::now();
        let mut facts: Vec<ExtractedFact> = state
            .entries
            .values()
            .filter(|e| !self.is_expired(e, now))
            .filter_map(|e| match &e.value {
                StoredValue::Facts(facts) => Some(facts.iter().filter(|f| f.kind() == kind).cloned()),
                StoredValue::Record(_) => None,
            })
            .flatten()
            .collect();
        facts.sort_by(|a, b| a.record_id().cmp(b.record_id()).then_with(|| a.span().cmp(&b.span())));
        Ok(facts)
    }

    async fn record_search(&self, entry: SearchHistoryEntry) -> Result<()> {
        push_capped(&mut self.state.write().await.searches, entry);
        Ok(())
    }

    async fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let state = self.state.read().await;
        let mut searches = state.searches.clone();
        searches.sort_by(|a, b| b.searched_at.cmp(&a.searched_at));
        searches.truncate(limit);
        Ok(searches)
    }

    async fn log_question(&self, entry: QuestionLogEntry) -> Result<()> {
        push_capped(&mut self.state.write().await.questions, entry);
        Ok(())
    }

    async fn recent_questions(&self, limit: usize) -> Result<Vec<QuestionLogEntry>> {
        let state = self.state.read().await;
        let mut questions = state.questions.clone();
        questions.sort_by(|a, b| b.asked_at.cmp(&a.asked_at));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn flush(&self) -> Result<()> {
        let purged = self.purge_expired().await;
        if purged > 0 {
            debug!(purged, "Expired entries evicted");
        }
        self.write_snapshot().await
    }
}
