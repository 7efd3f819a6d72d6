//! Extraction over realistic abstracts.

use ferrobind_common::{FactKind, MergedRecord, RawRecord, SourceKind};
use ferrobind_ner::{ExtractorConfig, FactExtractor};
use pretty_assertions::assert_eq;

fn record(id: &str, title: &str, abstract_text: &str) -> MergedRecord {
    let mut r = RawRecord::new(SourceKind::PubMed, id, title);
    r.abstract_text = Some(abstract_text.to_string());
    r.pub_date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1);
    MergedRecord::from_members(vec![r]).unwrap()
}

const BINDER_ABSTRACT: &str = "Peptide binders are an emerging therapeutic modality. \
    Here, a 15 kDa miniprotein binder against PD-L1 was expressed in E. coli BL21 and \
    purified by Ni-NTA chromatography followed by size-exclusion chromatography. \
    We show that the binder blocks the PD-1/PD-L1 interaction with nanomolar affinity.";

#[test]
fn binder_abstract_yields_one_fact_per_kind() {
    let rec = record("38000001", "De novo design of a compact PD-L1 binder", BINDER_ABSTRACT);
    let facts = FactExtractor::new(ExtractorConfig::default()).unwrap().extract(&rec);

    let expr: Vec<&str> = facts
        .iter()
        .filter(|f| f.kind() == FactKind::ExpressionSystem)
        .map(|f| f.value())
        .collect();
    assert_eq!(expr, vec!["E. coli BL21"]);

    let purification: Vec<&str> = facts
        .iter()
        .filter(|f| f.kind() == FactKind::PurificationMethod)
        .map(|f| f.value())
        .collect();
    assert_eq!(
        purification,
        vec!["Ni-NTA affinity chromatography", "size-exclusion chromatography"]
    );

    let targets: Vec<&str> = facts
        .iter()
        .filter(|f| f.kind() == FactKind::TargetProtein)
        .map(|f| f.value())
        .collect();
    assert!(targets.contains(&"PD-L1"));
    assert!(facts.iter().any(|f| f.kind() == FactKind::Other && f.value().starts_with("We show")));

    // "binder against PD-L1" qualifies the exact match
    let pdl1 = facts.iter().find(|f| f.value() == "PD-L1").unwrap();
    assert!(pdl1.confidence() > 0.55);
    assert!(facts.iter().all(|f| f.record_id() == rec.id()));
}

#[test]
fn extraction_is_deterministic_across_instances() {
    let rec = record("38000002", "Yeast display of HER2 binders", BINDER_ABSTRACT);
    let a = FactExtractor::new(ExtractorConfig::default()).unwrap().extract(&rec);
    let b = FactExtractor::new(ExtractorConfig::default()).unwrap().extract(&rec);
    assert_eq!(a, b);
}

#[test]
fn no_fact_below_threshold() {
    let rec = record(
        "38000003",
        "Notes on expression",
        "HEK293 and baculovirs were compared. Lysozyme, ubiquitin and SEC appear in passing. \
         Overall, yields were modest.",
    );
    for threshold in [0.0, 0.25, 0.3, 0.45, 0.6, 0.8, 1.0] {
        let config = ExtractorConfig { min_confidence: threshold, ..Default::default() };
        let facts = FactExtractor::new(config).unwrap().extract(&rec);
        for fact in &facts {
            assert!(
                fact.confidence() >= threshold,
                "{} scored {} under threshold {threshold}",
                fact.value(),
                fact.confidence()
            );
        }
    }
}

#[test]
fn fuzzy_matching_can_be_disabled() {
    let rec = record("38000004", "Insect expression", "Proteins were expressed using baculovirs vectors.");
    let with = FactExtractor::new(ExtractorConfig::default()).unwrap().extract(&rec);
    let without = FactExtractor::new(ExtractorConfig { fuzzy_matching: false, ..Default::default() })
        .unwrap()
        .extract(&rec);
    assert!(with.iter().any(|f| f.value() == "baculovirus/insect cells"));
    assert!(!without.iter().any(|f| f.value() == "baculovirus/insect cells"));
}

#[test]
fn long_abstract_is_truncated() {
    let filler = "Filler sentence without entities. ".repeat(200);
    let rec = record("38000005", "Truncation", &format!("{filler}Expressed in CHO cells."));
    let facts = FactExtractor::new(ExtractorConfig::default()).unwrap().extract(&rec);
    assert!(!facts.iter().any(|f| f.kind() == FactKind::ExpressionSystem));
}
