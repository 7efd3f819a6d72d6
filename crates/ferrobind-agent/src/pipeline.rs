//! Question → answer pipeline.
//!
//! normalize → fan out to sources → deduplicate → extract facts (cached per
//! record) → rank and compose. Each run is logged to the store's search
//! history and question log.

use std::sync::Arc;

use ferrobind_common::{ExtractedFact, FerrobindError, MergedRecord};
use ferrobind_db::{EvidenceStore, MemoryStore, QuestionLogEntry, SearchHistoryEntry, StoreKey, StoredValue};
use ferrobind_ingestion::{AggregationReport, Aggregator, AggregatorConfig, QueryNormalizer, SourceAdapter};
use ferrobind_ner::{ExtractorConfig, FactExtractor};
use ferrobind_qa::{Answer, QaConfig, QaEngine};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub answer: Answer,
    pub report: AggregationReport,
    pub facts: Vec<ExtractedFact>,
}

pub struct Pipeline {
    normalizer: QueryNormalizer,
    aggregator: Aggregator,
    extractor: FactExtractor,
    qa: QaEngine,
    store: Arc<dyn EvidenceStore>,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        aggregation: AggregatorConfig,
        extraction: ExtractorConfig,
        qa: QaConfig,
        store: Arc<dyn EvidenceStore>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            normalizer: QueryNormalizer::new(),
            aggregator: Aggregator::new(adapters, aggregation),
            extractor: FactExtractor::new(extraction)?,
            qa: QaEngine::new(qa)?,
            store,
        })
    }

    /// Build adapters and open the store as configured.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let adapters = config.build_adapters()?;
        let ttl = chrono::Duration::hours(config.store.cache_ttl_hours);
        let store: Arc<dyn EvidenceStore> = match config.store.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Arc::new(MemoryStore::open(path, ttl).await?),
            None => Arc::new(MemoryStore::new(ttl)),
        };
        info!(sources = adapters.len(), "Pipeline ready");
        Self::new(
            adapters,
            config.aggregation.clone(),
            config.extraction.clone(),
            config.qa.clone(),
            store,
        )
    }

    pub fn store(&self) -> &Arc<dyn EvidenceStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Answer `question`. Only an unusable question is an error; source
    /// failures and timeouts degrade to fewer (or no) citations.
    pub async fn answer_question(&self, question: &str) -> Result<Answer, FerrobindError> {
        self.run(question).await.map(|outcome| outcome.answer)
    }

    /// `answer_question` for callers outside a tokio runtime. Calling it
    /// from within one is an error; await `answer_question` there instead.
    pub fn answer_question_blocking(&self, question: &str) -> Result<Answer, FerrobindError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(FerrobindError::Other(anyhow::anyhow!(
                "answer_question_blocking called inside an async runtime; use answer_question"
            )));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FerrobindError::Other(e.into()))?;
        runtime.block_on(self.answer_question(question))
    }

    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, question: &str) -> Result<RunOutcome, FerrobindError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let query = self.normalizer.normalize(question)?;
        info!(terms = ?query.terms(), "Query normalized");

        let report = self.aggregator.aggregate(&query).await;
        if let Some(timeout) = report.timeout_error() {
            warn!(error = %timeout, "No source answered in time");
        }

        let mut facts = Vec::new();
        for record in &report.records {
            facts.extend(self.facts_for(record).await);
        }
        info!(records = report.records.len(), facts = facts.len(), "Extraction complete");

        let answer = self.qa.answer(&query, &facts, &report.records);

        self.log_run(&query.keyword_string(), &report, &answer).await;

        Ok(RunOutcome { run_id, answer, report, facts })
    }

    /// Cached facts for `record`, extracting and caching on a miss. Cached
    /// facts are reused only while the cached record yields the same
    /// extraction text; a record that gained an abstract is re-extracted.
    /// Store failures only cost the cache.
    async fn facts_for(&self, record: &MergedRecord) -> Vec<ExtractedFact> {
        if let Some(facts) = self.cached_facts(record).await {
            debug!(record = %record.id(), "Fact cache hit");
            return facts;
        }

        let facts = self.extractor.extract(record);
        let writes = [
            (StoreKey::Record(record.id().clone()), StoredValue::Record(record.clone())),
            (StoreKey::Facts(record.id().clone()), StoredValue::Facts(facts.clone())),
        ];
        for (key, value) in writes {
            if let Err(e) = self.store.put(key, value).await {
                warn!(record = %record.id(), error = %e, "Store write failed");
            }
        }
        facts
    }

    async fn cached_facts(&self, record: &MergedRecord) -> Option<Vec<ExtractedFact>> {
        let max_chars = self.extractor.config().max_text_chars;
        let cached_record = match self.store.get(&StoreKey::Record(record.id().clone())).await {
            Ok(value) => value.and_then(StoredValue::into_record)?,
            Err(e) => {
                warn!(record = %record.id(), error = %e, "Record cache read failed");
                return None;
            }
        };
        if cached_record.extraction_text(max_chars) != record.extraction_text(max_chars) {
            debug!(record = %record.id(), "Cached record text changed, re-extracting");
            return None;
        }
        match self.store.get(&StoreKey::Facts(record.id().clone())).await {
            Ok(value) => value.and_then(StoredValue::into_facts),
            Err(e) => {
                warn!(record = %record.id(), error = %e, "Fact cache read failed");
                None
            }
        }
    }

    async fn log_run(&self, keywords: &str, report: &AggregationReport, answer: &Answer) {
        let search = SearchHistoryEntry::new(keywords, report.queried_sources(), report.records.len());
        if let Err(e) = self.store.record_search(search).await {
            warn!(error = %e, "Could not record search history");
        }
        let entry = QuestionLogEntry::new(&answer.question, &answer.text, answer.cited_ids(), answer.evidence_found);
        if let Err(e) = self.store.log_question(entry).await {
            warn!(error = %e, "Could not log question");
        }
        if let Err(e) = self.store.flush().await {
            warn!(error = %e, "Could not persist store");
        }
    }
}
