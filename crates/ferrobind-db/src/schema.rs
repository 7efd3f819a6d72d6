//! Stored value types.

use std::fmt;

use chrono::{DateTime, Utc};
use ferrobind_common::{CanonicalId, ExtractedFact, MergedRecord, SourceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cache key. Records and their extracted facts live side by side under
/// the same canonical id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum StoreKey {
    Record(CanonicalId),
    Facts(CanonicalId),
}

impl StoreKey {
    pub fn id(&self) -> &CanonicalId {
        match self {
            StoreKey::Record(id) | StoreKey::Facts(id) => id,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Record(id) => write!(f, "record:{id}"),
            StoreKey::Facts(id) => write!(f, "facts:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Record(MergedRecord),
    Facts(Vec<ExtractedFact>),
}

impl StoredValue {
    pub fn into_record(self) -> Option<MergedRecord> {
        match self {
            StoredValue::Record(r) => Some(r),
            StoredValue::Facts(_) => None,
        }
    }

    pub fn into_facts(self) -> Option<Vec<ExtractedFact>> {
        match self {
            StoredValue::Facts(f) => Some(f),
            StoredValue::Record(_) => None,
        }
    }
}

/// One pipeline run, as shown by `ferrobind history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub keywords: String,
    pub sources: Vec<SourceKind>,
    pub result_count: usize,
    pub searched_at: DateTime<Utc>,
}

impl SearchHistoryEntry {
    pub fn new(keywords: impl Into<String>, sources: Vec<SourceKind>, result_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            keywords: keywords.into(),
            sources,
            result_count,
            searched_at: Utc::now(),
        }
    }
}

/// An answered question with what it cited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionLogEntry {
    pub id: Uuid,
    pub question: String,
    pub answer_text: String,
    pub cited: Vec<CanonicalId>,
    pub evidence_found: bool,
    pub asked_at: DateTime<Utc>,
}

impl QuestionLogEntry {
    pub fn new(question: impl Into<String>, answer_text: impl Into<String>, cited: Vec<CanonicalId>, evidence_found: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer_text: answer_text.into(),
            cited,
            evidence_found,
            asked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_serde() {
        let key = StoreKey::Facts(CanonicalId::from_doi("10.1/x"));
        assert!(key.to_string().starts_with("facts:"));
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains("\"kind\":\"facts\""));
        let back: StoreKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_value_accessors() {
        let v = StoredValue::Facts(Vec::new());
        assert_eq!(v.clone().into_facts(), Some(Vec::new()));
        assert!(v.into_record().is_none());
    }
}
