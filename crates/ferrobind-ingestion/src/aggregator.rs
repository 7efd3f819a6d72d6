//! Concurrent fan-out across source adapters.
//!
//! Every enabled adapter runs in its own task. Results that arrive before the
//! overall deadline are deduplicated into merged records; adapters that fail,
//! panic, or are still running at the deadline contribute nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use ferrobind_common::{FerrobindError, MergedRecord, RawRecord, SearchQuery, SourceKind};
use serde::Deserialize;
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::dedup::{deduplicate, DedupConfig};
use crate::sources::SourceAdapter;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AggregatorConfig {
    /// Overall deadline for the fan-out, independent of adapter retries.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default)]
    pub dedup: DedupConfig,
}

fn default_deadline_ms() -> u64 { 30_000 }
fn default_page_limit() -> usize { 2 }

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            page_limit: default_page_limit(),
            dedup: DedupConfig::default(),
        }
    }
}

/// What one source contributed to a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Returned { records: usize },
    Failed { reason: String },
    TimedOut,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Returned { .. })
    }
}

/// Result of one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub records: Vec<MergedRecord>,
    pub outcomes: BTreeMap<SourceKind, SourceOutcome>,
    pub timed_out: bool,
    pub deadline: Duration,
}

impl AggregationReport {
    /// Sources that returned before the deadline, successfully or not.
    pub fn responded(&self) -> usize {
        self.outcomes.values().filter(|o| !matches!(o, SourceOutcome::TimedOut)).count()
    }

    pub fn raw_record_count(&self) -> usize {
        self.records.iter().map(|r| r.members().len()).sum()
    }

    /// The timeout error value when the deadline elapsed with no source
    /// having returned. Never raised by the aggregator itself.
    pub fn timeout_error(&self) -> Option<FerrobindError> {
        (self.timed_out && self.responded() == 0).then(|| FerrobindError::AggregationTimeout {
            deadline_ms: self.deadline.as_millis() as u64,
        })
    }

    pub fn queried_sources(&self) -> Vec<SourceKind> {
        self.outcomes.keys().copied().collect()
    }
}

pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, config: AggregatorConfig) -> Self {
        Self { adapters, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    /// Query every adapter concurrently and merge what comes back in time.
    #[instrument(skip(self, query), fields(question = query.question(), sources = self.adapters.len()))]
    pub async fn aggregate(&self, query: &SearchQuery) -> AggregationReport {
        let deadline = Duration::from_millis(self.config.deadline_ms);
        let deadline_at = Instant::now() + deadline;
        let page_limit = self.config.page_limit;

        let mut outcomes: BTreeMap<SourceKind, SourceOutcome> = self
            .adapters
            .iter()
            .map(|a| (a.kind(), SourceOutcome::TimedOut))
            .collect();

        let mut set = JoinSet::new();
        let mut tasks: HashMap<task::Id, SourceKind> = HashMap::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let kind = adapter.kind();
            let query = query.clone();
            let handle = set.spawn(async move { (kind, adapter.search(&query, page_limit).await) });
            tasks.insert(handle.id(), kind);
        }

        let mut collected: Vec<RawRecord> = Vec::new();
        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline_at, set.join_next_with_id()).await {
                Ok(Some(Ok((_, (kind, Ok(records)))))) => {
                    info!(source = %kind, count = records.len(), "Source returned");
                    outcomes.insert(kind, SourceOutcome::Returned { records: records.len() });
                    collected.extend(records);
                }
                Ok(Some(Ok((_, (kind, Err(e)))))) => {
                    warn!(source = %kind, error = %e, "Source unavailable");
                    outcomes.insert(kind, SourceOutcome::Failed { reason: e.to_string() });
                }
                Ok(Some(Err(join_err))) => {
                    let Some(kind) = tasks.get(&join_err.id()).copied() else {
                        warn!(error = %join_err, "Unknown source task failed");
                        continue;
                    };
                    warn!(source = %kind, error = %join_err, "Source task failed");
                    outcomes.insert(kind, SourceOutcome::Failed { reason: format!("search task failed: {join_err}") });
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    let pending: Vec<String> = outcomes
                        .iter()
                        .filter(|(_, o)| matches!(o, SourceOutcome::TimedOut))
                        .map(|(k, _)| k.to_string())
                        .collect();
                    warn!(?pending, deadline_ms = self.config.deadline_ms, "Aggregation deadline reached");
                    set.abort_all();
                    break;
                }
            }
        }

        let records = deduplicate(collected, &self.config.dedup);
        info!(merged = records.len(), timed_out, "Aggregation complete");

        AggregationReport { records, outcomes, timed_out, deadline }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap as Map;

    struct Fixed(SourceKind, Vec<RawRecord>);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn kind(&self) -> SourceKind { self.0 }
        async fn search(&self, _: &SearchQuery, _: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
            Ok(self.1.clone())
        }
    }

    fn query() -> SearchQuery {
        SearchQuery::new("q", vec!["binder".into()], Map::new())
    }

    #[tokio::test]
    async fn test_all_empty_is_not_an_error() {
        let agg = Aggregator::new(
            vec![Arc::new(Fixed(SourceKind::PubMed, vec![])), Arc::new(Fixed(SourceKind::BioRxiv, vec![]))],
            AggregatorConfig::default(),
        );
        let report = agg.aggregate(&query()).await;
        assert!(report.records.is_empty());
        assert!(!report.timed_out);
        assert!(report.timeout_error().is_none());
        assert_eq!(report.responded(), 2);
    }

    #[tokio::test]
    async fn test_cross_source_merge() {
        let mut a = RawRecord::new(SourceKind::PubMed, "1", "Binder paper");
        a.doi = Some("10.1/b".into());
        let mut b = RawRecord::new(SourceKind::BioRxiv, "10.1/b", "Binder paper (preprint)");
        b.doi = Some("10.1/B".into());
        let agg = Aggregator::new(
            vec![Arc::new(Fixed(SourceKind::PubMed, vec![a])), Arc::new(Fixed(SourceKind::BioRxiv, vec![b]))],
            AggregatorConfig::default(),
        );
        let report = agg.aggregate(&query()).await;
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].relevance(), 2);
        assert_eq!(report.raw_record_count(), 2);
    }

    struct Panicking;

    #[async_trait]
    impl SourceAdapter for Panicking {
        fn kind(&self) -> SourceKind { SourceKind::Scopus }
        async fn search(&self, _: &SearchQuery, _: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
            panic!("malformed response")
        }
    }

    #[tokio::test]
    async fn test_panicking_adapter_reported_as_failed() {
        let agg = Aggregator::new(
            vec![
                Arc::new(Fixed(SourceKind::PubMed, vec![RawRecord::new(SourceKind::PubMed, "1", "Binder paper")])),
                Arc::new(Panicking),
            ],
            AggregatorConfig::default(),
        );
        let report = agg.aggregate(&query()).await;
        assert_eq!(report.records.len(), 1);
        assert!(!report.timed_out);
        match &report.outcomes[&SourceKind::Scopus] {
            SourceOutcome::Failed { reason } => assert!(reason.starts_with("search task failed")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
