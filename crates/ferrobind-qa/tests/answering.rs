//! Extraction feeding the QA engine.

use std::collections::BTreeMap;

use ferrobind_common::{FactKind, MergedRecord, RawRecord, SearchQuery, SourceKind};
use ferrobind_ner::{ExtractorConfig, FactExtractor};
use ferrobind_qa::{QaConfig, QaEngine};
use pretty_assertions::assert_eq;

fn record(source: SourceKind, id: &str, doi: &str, title: &str, abstract_text: &str) -> RawRecord {
    let mut r = RawRecord::new(source, id, title);
    r.doi = Some(doi.to_string());
    r.abstract_text = Some(abstract_text.to_string());
    r
}

fn query() -> SearchQuery {
    SearchQuery::new(
        "expression system for a 15 kDa peptide binder target",
        vec!["expression system".into(), "peptide binder".into(), "target".into()],
        BTreeMap::new(),
    )
}

fn corpus() -> Vec<MergedRecord> {
    let mentioning = MergedRecord::from_members(vec![
        record(
            SourceKind::PubMed,
            "39000001",
            "10.1000/binder.1",
            "A 15 kDa peptide binder",
            "The peptide binder was expressed in E. coli BL21 and purified by Ni-NTA chromatography.",
        ),
        record(
            SourceKind::BioRxiv,
            "10.1000/binder.1",
            "10.1000/binder.1",
            "A 15 kDa peptide binder",
            "Preprint version.",
        ),
    ])
    .unwrap();
    let unrelated = MergedRecord::from_members(vec![record(
        SourceKind::Scopus,
        "SCOPUS_ID:1",
        "10.1000/folding.2",
        "Kinetics of protein folding",
        "Folding rates were measured at several temperatures.",
    )])
    .unwrap();
    vec![mentioning, unrelated]
}

fn extract_all(records: &[MergedRecord]) -> Vec<ferrobind_common::ExtractedFact> {
    let extractor = FactExtractor::new(ExtractorConfig::default()).unwrap();
    records.iter().flat_map(|r| extractor.extract(r)).collect()
}

#[test]
fn answer_cites_the_expression_host() {
    let records = corpus();
    let facts = extract_all(&records);
    let answer = QaEngine::new(QaConfig::default()).unwrap().answer(&query(), &facts, &records);

    assert!(answer.evidence_found);
    let host = answer
        .claims
        .iter()
        .find(|c| c.kind == FactKind::ExpressionSystem)
        .expect("expression system claim");
    assert_eq!(host.value, "E. coli BL21");
    assert!(host.confidence >= 0.3);

    assert_eq!(answer.cited_ids(), vec![records[0].id().clone()]);
    assert!(answer.text.contains("Expression systems reported: E. coli BL21 [1]"));
    assert!(answer.text.contains("[1] A 15 kDa peptide binder. doi:10.1000/binder.1"));
    assert!(!answer.text.contains("folding"));
}

#[test]
fn raising_min_rank_yields_no_evidence() {
    let records = corpus();
    let facts = extract_all(&records);
    let engine = QaEngine::new(QaConfig { min_rank: 1.01, ..Default::default() }).unwrap();
    let answer = engine.answer(&query(), &facts, &records);
    assert!(!answer.evidence_found);
    assert!(answer.claims.is_empty());
}

#[test]
fn top_n_limits_claims() {
    let records = corpus();
    let facts = extract_all(&records);
    let engine = QaEngine::new(QaConfig { top_n: 1, ..Default::default() }).unwrap();
    let answer = engine.answer(&query(), &facts, &records);
    assert_eq!(answer.claims.len(), 1);
}

#[test]
fn answer_serializes() {
    let records = corpus();
    let facts = extract_all(&records);
    let answer = QaEngine::new(QaConfig::default()).unwrap().answer(&query(), &facts, &records);
    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["evidence_found"], serde_json::Value::Bool(true));
}

#[test]
fn top_n_counts_distinct_claims_not_repeated_facts() {
    use ferrobind_common::{ExtractedFact, TextSpan};

    let papers: Vec<MergedRecord> = (1..=4)
        .map(|n| {
            MergedRecord::from_members(vec![record(
                SourceKind::PubMed,
                &format!("3900000{n}"),
                &format!("10.1000/host.{n}"),
                &format!("Binder paper {n}"),
                "abstract",
            )])
            .unwrap()
        })
        .collect();
    let fact = |rec: &MergedRecord, kind, value: &str, confidence, snippet: &str| {
        ExtractedFact::new(rec.id().clone(), kind, value, confidence, TextSpan::new(0, 1), snippet)
    };
    let mut facts: Vec<ExtractedFact> = papers[..3]
        .iter()
        .map(|p| fact(p, FactKind::ExpressionSystem, "E. coli", 0.9, "The peptide binder was expressed in E. coli."))
        .collect();
    facts.push(fact(&papers[3], FactKind::PurificationMethod, "Ni-NTA", 0.6, "The peptide binder was purified by Ni-NTA."));
    facts.push(fact(&papers[3], FactKind::TargetProtein, "PD-L1", 0.3, "Binds PD-L1."));

    let engine = QaEngine::new(QaConfig { top_n: 2, ..Default::default() }).unwrap();
    let answer = engine.answer(&query(), &facts, &papers);

    let claims: Vec<(FactKind, &str)> = answer.claims.iter().map(|c| (c.kind, c.value.as_str())).collect();
    assert_eq!(
        claims,
        vec![(FactKind::ExpressionSystem, "E. coli"), (FactKind::PurificationMethod, "Ni-NTA")]
    );
    assert_eq!(answer.claims[0].citations, vec![1, 2, 3]);
    assert_eq!(answer.citations.len(), 4);
}
