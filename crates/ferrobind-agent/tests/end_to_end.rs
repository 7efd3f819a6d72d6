//! Whole-pipeline runs against fake sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferrobind_agent::Pipeline;
use ferrobind_common::{FactKind, FerrobindError, RawRecord, SearchQuery, SourceKind};
use ferrobind_db::{EvidenceStore, MemoryStore, StoreKey};
use ferrobind_ingestion::{AggregatorConfig, SourceAdapter, SourceOutcome};
use ferrobind_ner::ExtractorConfig;
use ferrobind_qa::QaConfig;
use pretty_assertions::assert_eq;

const QUESTION: &str = "expression system for a 15 kDa peptide binder target";

struct Fixed(SourceKind, Vec<RawRecord>);

#[async_trait]
impl SourceAdapter for Fixed {
    fn kind(&self) -> SourceKind {
        self.0
    }
    async fn search(&self, _: &SearchQuery, _: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        Ok(self.1.clone())
    }
}

struct Down(SourceKind);

#[async_trait]
impl SourceAdapter for Down {
    fn kind(&self) -> SourceKind {
        self.0
    }
    async fn search(&self, _: &SearchQuery, _: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        Err(FerrobindError::source_unavailable(self.0, "HTTP 503 after 3 attempts"))
    }
}

struct Slow(SourceKind);

#[async_trait]
impl SourceAdapter for Slow {
    fn kind(&self) -> SourceKind {
        self.0
    }
    async fn search(&self, _: &SearchQuery, _: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Ok(Vec::new())
    }
}

fn binder_paper(source: SourceKind, native_id: &str) -> RawRecord {
    let mut r = RawRecord::new(source, native_id, "A 15 kDa peptide binder for PD-L1");
    r.doi = Some("10.1000/binder.2024.1".into());
    r.abstract_text = Some(
        "The peptide binder was expressed in E. coli BL21 and purified by Ni-NTA chromatography. \
         We show that it blocks PD-L1 signalling."
            .into(),
    );
    r.pub_date = chrono::NaiveDate::from_ymd_opt(2024, 5, 2);
    r
}

fn unrelated_paper(source: SourceKind, native_id: &str) -> RawRecord {
    let mut r = RawRecord::new(source, native_id, "Thermal stability of enzymes in soil");
    r.doi = Some("10.1000/soil.2023.7".into());
    r.abstract_text = Some("Enzyme activity declined with temperature across sites.".into());
    r.pub_date = chrono::NaiveDate::from_ymd_opt(2023, 8, 9);
    r
}

fn pipeline(adapters: Vec<Arc<dyn SourceAdapter>>, deadline_ms: u64, store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(
        adapters,
        AggregatorConfig { deadline_ms, ..Default::default() },
        ExtractorConfig::default(),
        QaConfig::default(),
        store,
    )
    .unwrap()
}

#[tokio::test]
async fn answers_with_expression_host_despite_failing_source() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(
        vec![
            Arc::new(Fixed(SourceKind::PubMed, vec![binder_paper(SourceKind::PubMed, "38111111")])),
            Arc::new(Fixed(SourceKind::BioRxiv, vec![binder_paper(SourceKind::BioRxiv, "10.1000/binder.2024.1")])),
            Arc::new(Down(SourceKind::Scopus)),
            Arc::new(Fixed(SourceKind::WebOfScience, vec![unrelated_paper(SourceKind::WebOfScience, "WOS:1")])),
        ],
        30_000,
        store.clone(),
    );

    let outcome = pipeline.run(QUESTION).await.unwrap();

    assert_eq!(outcome.report.records.len(), 2);
    assert_eq!(outcome.report.records[0].relevance(), 2);
    assert!(matches!(outcome.report.outcomes[&SourceKind::Scopus], SourceOutcome::Failed { .. }));

    let answer = &outcome.answer;
    assert!(answer.evidence_found);
    let host = answer
        .claims
        .iter()
        .find(|c| c.kind == FactKind::ExpressionSystem)
        .expect("expression system claim");
    assert_eq!(host.value, "E. coli BL21");
    assert!(host.confidence >= 0.3);

    let binder_id = outcome.report.records[0].id().clone();
    assert_eq!(answer.cited_ids(), vec![binder_id.clone()]);
    assert!(!answer.text.contains("soil"));

    // facts were cached and the run was logged
    assert!(store.get(&StoreKey::Facts(binder_id)).await.unwrap().is_some());
    let history = store.recent_searches(5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result_count, 2);
    assert_eq!(history[0].sources.len(), 4);
    assert_eq!(store.recent_questions(5).await.unwrap()[0].question, QUESTION);
}

#[tokio::test(start_paused = true)]
async fn all_sources_timing_out_gives_no_evidence_answer() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(
        vec![Arc::new(Slow(SourceKind::PubMed)), Arc::new(Slow(SourceKind::BioRxiv))],
        500,
        store.clone(),
    );

    let outcome = pipeline.run(QUESTION).await.unwrap();
    assert!(outcome.report.records.is_empty());
    assert!(matches!(
        outcome.report.timeout_error(),
        Some(FerrobindError::AggregationTimeout { deadline_ms: 500 })
    ));
    assert!(!outcome.answer.evidence_found);
    assert!(outcome.answer.text.contains("No sufficiently confident evidence"));
    assert_eq!(store.recent_searches(5).await.unwrap()[0].result_count, 0);
}

#[tokio::test]
async fn unusable_question_is_rejected_before_any_search() {
    let store = Arc::new(MemoryStore::default());
    let pipeline = pipeline(vec![Arc::new(Down(SourceKind::PubMed))], 1_000, store.clone());

    let err = pipeline.answer_question("  what is the  ").await.unwrap_err();
    assert!(matches!(err, FerrobindError::InvalidQuery(_)));
    assert!(store.recent_searches(5).await.unwrap().is_empty());
}

#[test]
fn blocking_entry_point() {
    let pipeline = pipeline(
        vec![Arc::new(Fixed(SourceKind::PubMed, vec![binder_paper(SourceKind::PubMed, "38111111")]))],
        5_000,
        Arc::new(MemoryStore::default()),
    );
    let answer = pipeline.answer_question_blocking(QUESTION).unwrap();
    assert!(answer.evidence_found);
    assert_eq!(answer.citations.len(), 1);
}

#[tokio::test]
async fn cached_title_only_facts_are_refreshed_when_abstract_arrives() {
    let store = Arc::new(MemoryStore::default());

    let mut title_only = binder_paper(SourceKind::WebOfScience, "WOS:77");
    title_only.abstract_text = None;
    let first = pipeline(
        vec![Arc::new(Fixed(SourceKind::WebOfScience, vec![title_only.clone()]))],
        30_000,
        store.clone(),
    );
    let outcome = first.run(QUESTION).await.unwrap();
    assert!(outcome.facts.iter().all(|f| f.kind() != FactKind::ExpressionSystem));

    let second = pipeline(
        vec![
            Arc::new(Fixed(SourceKind::WebOfScience, vec![title_only])),
            Arc::new(Fixed(SourceKind::PubMed, vec![binder_paper(SourceKind::PubMed, "38111111")])),
        ],
        30_000,
        store.clone(),
    );
    let outcome = second.run(QUESTION).await.unwrap();
    let host = outcome
        .answer
        .claims
        .iter()
        .find(|c| c.kind == FactKind::ExpressionSystem)
        .expect("expression system claim after abstract arrived");
    assert_eq!(host.value, "E. coli BL21");

    // the refreshed extraction replaced the cached one
    let cached = store
        .get(&StoreKey::Facts(outcome.report.records[0].id().clone()))
        .await
        .unwrap()
        .and_then(|v| v.into_facts())
        .unwrap();
    assert!(cached.iter().any(|f| f.kind() == FactKind::ExpressionSystem));
}

#[tokio::test]
async fn blocking_entry_point_refuses_inside_runtime() {
    let pipeline = pipeline(
        vec![Arc::new(Fixed(SourceKind::PubMed, vec![binder_paper(SourceKind::PubMed, "38111111")]))],
        5_000,
        Arc::new(MemoryStore::default()),
    );
    let err = pipeline.answer_question_blocking(QUESTION).unwrap_err();
    assert!(matches!(err, FerrobindError::Other(_)));
}
