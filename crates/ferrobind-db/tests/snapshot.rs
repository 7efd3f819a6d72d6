//! Snapshot persistence across store instances.

use chrono::Duration;
use ferrobind_common::{MergedRecord, RawRecord, SourceKind};
use ferrobind_db::{EvidenceStore, MemoryStore, QuestionLogEntry, SearchHistoryEntry, StoreError, StoreKey, StoredValue};
use pretty_assertions::assert_eq;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("ferrobind-db-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[tokio::test]
async fn history_and_records_survive_reopen() {
    let path = temp_path("store.json");
    let rec = MergedRecord::from_members(vec![RawRecord::new(SourceKind::Scopus, "S1", "Binder paper")]).unwrap();

    {
        let store = MemoryStore::open(&path, Duration::hours(24)).await.unwrap();
        store
            .put(StoreKey::Record(rec.id().clone()), StoredValue::Record(rec.clone()))
            .await
            .unwrap();
        store
            .record_search(SearchHistoryEntry::new("peptide binder", vec![SourceKind::Scopus], 1))
            .await
            .unwrap();
        store
            .log_question(QuestionLogEntry::new("q?", "No evidence.", vec![], false))
            .await
            .unwrap();
        store.flush().await.unwrap();
    }

    let reopened = MemoryStore::open(&path, Duration::hours(24)).await.unwrap();
    assert_eq!(
        reopened.get(&StoreKey::Record(rec.id().clone())).await.unwrap(),
        Some(StoredValue::Record(rec))
    );
    let searches = reopened.recent_searches(5).await.unwrap();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].keywords, "peptide binder");
    assert_eq!(reopened.recent_questions(5).await.unwrap().len(), 1);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test]
async fn missing_snapshot_opens_empty() {
    let store = MemoryStore::open(temp_path("absent.json"), Duration::hours(1)).await.unwrap();
    assert!(store.recent_searches(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_snapshot_is_an_error() {
    let path = temp_path("corrupt.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{not json").unwrap();
    let err = MemoryStore::open(&path, Duration::hours(1)).await.err().unwrap();
    assert!(matches!(err, StoreError::Serialization(_)));
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
