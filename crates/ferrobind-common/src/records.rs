//! Bibliographic record model shared by the adapters, the aggregator and the
//! QA engine.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FerrobindError;

// ── Sources ─────────────────────────────────────────────────────────────────

/// Literature sources the pipeline can fan out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    PubMed,
    BioRxiv,
    Scopus,
    #[serde(rename = "wos")]
    WebOfScience,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::PubMed,
        SourceKind::BioRxiv,
        SourceKind::Scopus,
        SourceKind::WebOfScience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PubMed       => "pubmed",
            SourceKind::BioRxiv      => "biorxiv",
            SourceKind::Scopus       => "scopus",
            SourceKind::WebOfScience => "wos",
        }
    }

    /// Sources that refuse to run without an API key.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, SourceKind::Scopus | SourceKind::WebOfScience)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = FerrobindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pubmed"                              => Ok(SourceKind::PubMed),
            "biorxiv"                             => Ok(SourceKind::BioRxiv),
            "scopus"                              => Ok(SourceKind::Scopus),
            "wos" | "webofscience" | "web_of_science" => Ok(SourceKind::WebOfScience),
            other => Err(FerrobindError::Config(format!("unknown source '{other}'"))),
        }
    }
}

// ── Query ───────────────────────────────────────────────────────────────────

/// Bibliographic fields a query can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Abstract,
    Author,
}

/// Inclusive publication date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> crate::Result<Self> {
        if from > to {
            return Err(FerrobindError::InvalidQuery(format!(
                "date range starts ({from}) after it ends ({to})"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// A normalized, source-independent search request.
///
/// Built once by the query normalizer; the `with_*` methods return a new
/// value instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    question: String,
    terms: Vec<String>,
    synonyms: BTreeMap<String, Vec<String>>,
    date_range: Option<DateRange>,
    fields: BTreeSet<SearchField>,
}

impl SearchQuery {
    pub fn new(
        question: impl Into<String>,
        terms: Vec<String>,
        synonyms: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            question: question.into(),
            terms,
            synonyms,
            date_range: None,
            fields: BTreeSet::new(),
        }
    }

    pub fn with_date_range(self, date_range: DateRange) -> Self {
        Self { date_range: Some(date_range), ..self }
    }

    pub fn with_fields(self, fields: impl IntoIterator<Item = SearchField>) -> Self {
        Self { fields: fields.into_iter().collect(), ..self }
    }

    pub fn question(&self) -> &str { &self.question }
    pub fn terms(&self) -> &[String] { &self.terms }
    pub fn date_range(&self) -> Option<&DateRange> { self.date_range.as_ref() }
    pub fn fields(&self) -> &BTreeSet<SearchField> { &self.fields }

    pub fn synonyms_for(&self, term: &str) -> &[String] {
        self.synonyms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Each term followed by its synonyms; adapters OR inside a group and
    /// AND across groups.
    pub fn term_groups(&self) -> Vec<Vec<&str>> {
        self.terms
            .iter()
            .map(|t| {
                std::iter::once(t.as_str())
                    .chain(self.synonyms_for(t).iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }

    /// Every lowercase word appearing in a term or synonym.
    pub fn vocabulary(&self) -> BTreeSet<String> {
        self.term_groups()
            .into_iter()
            .flatten()
            .flat_map(|phrase| phrase.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>())
            .collect()
    }

    /// Number of term groups with at least one member found in `text`
    /// (case-insensitive substring match).
    pub fn matched_groups(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.term_groups()
            .iter()
            .filter(|group| group.iter().any(|t| lower.contains(&t.to_lowercase())))
            .count()
    }

    /// Space-separated terms, used by the search history log.
    pub fn keyword_string(&self) -> String {
        self.terms.join(" ")
    }
}

// ── Raw records ─────────────────────────────────────────────────────────────

/// One bibliographic record exactly as a single adapter call returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceKind,
    pub native_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub pub_date: Option<NaiveDate>,
    pub doi: Option<String>,
    pub url: Option<String>,
    pub journal: Option<String>,
    pub keywords: Vec<String>,
}

impl RawRecord {
    pub fn new(source: SourceKind, native_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source,
            native_id: native_id.into(),
            title: title.into(),
            abstract_text: None,
            authors: Vec::new(),
            pub_date: None,
            doi: None,
            url: None,
            journal: None,
            keywords: Vec::new(),
        }
    }

    pub fn normalized_doi(&self) -> Option<String> {
        self.doi.as_deref().and_then(normalize_doi)
    }

    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    pub fn year(&self) -> Option<i32> {
        self.pub_date.map(|d| d.year())
    }
}

/// Lowercase a DOI and strip resolver prefixes. Empty DOIs become `None`.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let mut d = doi.trim().to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"] {
        if let Some(rest) = d.strip_prefix(prefix) {
            d = rest.trim().to_string();
        }
    }
    if d.is_empty() { None } else { Some(d) }
}

/// Case-fold, drop punctuation, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Canonical ids ───────────────────────────────────────────────────────────

/// Stable identifier of one underlying publication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn from_doi(normalized_doi: &str) -> Self {
        Self::digest(&format!("doi:{normalized_doi}"))
    }

    pub fn from_title_year(normalized_title: &str, year: Option<i32>) -> Self {
        let year = year.map(|y| y.to_string()).unwrap_or_default();
        Self::digest(&format!("title:{normalized_title}|{year}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digest(input: &str) -> Self {
        let hash = Sha256::digest(input.as_bytes());
        Self(hash[..8].iter().map(|b| format!("{b:02x}")).collect())
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Merged records ──────────────────────────────────────────────────────────

/// The deduplicated view of one publication, backed by one or more raw
/// records from any mix of sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    id: CanonicalId,
    members: Vec<RawRecord>,
    relevance: u32,
    latest_date: Option<NaiveDate>,
}

impl MergedRecord {
    /// Build a merged record from a cluster. Returns `None` for an empty
    /// cluster. The result does not depend on the order of `members`.
    pub fn from_members(mut members: Vec<RawRecord>) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        members.sort_by(|a, b| {
            a.source.cmp(&b.source)
                .then_with(|| a.native_id.cmp(&b.native_id))
                .then_with(|| a.title.cmp(&b.title))
        });

        let id = match members.iter().filter_map(RawRecord::normalized_doi).min() {
            Some(doi) => CanonicalId::from_doi(&doi),
            None => {
                let (title, year) = members
                    .iter()
                    .map(|m| (m.normalized_title(), m.year()))
                    .min()?;
                CanonicalId::from_title_year(&title, year)
            }
        };

        let relevance = members.iter().map(|m| m.source).collect::<BTreeSet<_>>().len() as u32;
        let latest_date = members.iter().filter_map(|m| m.pub_date).max();

        Some(Self { id, members, relevance, latest_date })
    }

    pub fn id(&self) -> &CanonicalId { &self.id }
    pub fn members(&self) -> &[RawRecord] { &self.members }

    /// Number of distinct sources that returned this publication.
    pub fn relevance(&self) -> u32 { self.relevance }
    pub fn latest_date(&self) -> Option<NaiveDate> { self.latest_date }

    pub fn sources(&self) -> BTreeSet<SourceKind> {
        self.members.iter().map(|m| m.source).collect()
    }

    /// Longest member title.
    pub fn title(&self) -> &str {
        self.members
            .iter()
            .map(|m| m.title.as_str())
            .max_by_key(|t| t.len())
            .unwrap_or("")
    }

    /// Longest non-empty member abstract.
    pub fn abstract_text(&self) -> Option<&str> {
        self.members
            .iter()
            .filter_map(|m| m.abstract_text.as_deref())
            .filter(|a| !a.trim().is_empty())
            .max_by_key(|a| a.len())
    }

    pub fn doi(&self) -> Option<String> {
        self.members.iter().filter_map(RawRecord::normalized_doi).min()
    }

    pub fn year(&self) -> Option<i32> {
        self.latest_date.map(|d| d.year())
    }

    /// Title and abstract joined, truncated to at most `max_chars` characters.
    pub fn extraction_text(&self, max_chars: usize) -> String {
        let mut text = self.title().trim().trim_end_matches('.').to_string();
        if let Some(abs) = self.abstract_text() {
            text.push_str(". ");
            text.push_str(abs.trim());
        }
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text,
        }
    }

    /// Short human-readable reference, e.g. `Title (2024). doi:10.1/x`.
    pub fn citation_label(&self) -> String {
        let mut label = self.title().trim().trim_end_matches('.').to_string();
        if let Some(year) = self.year() {
            label.push_str(&format!(" ({year})"));
        }
        if let Some(doi) = self.doi() {
            label.push_str(&format!(". doi:{doi}"));
        } else if let Some(url) = self.members.iter().find_map(|m| m.url.as_deref()) {
            label.push_str(&format!(". {url}"));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(source: SourceKind, id: &str, title: &str) -> RawRecord {
        RawRecord::new(source, id, title)
    }

    #[test]
    fn test_normalize_doi_strips_resolver() {
        assert_eq!(normalize_doi("https://doi.org/10.1101/ABC.123"), Some("10.1101/abc.123".into()));
        assert_eq!(normalize_doi(" doi:10.1/x "), Some("10.1/x".into()));
        assert_eq!(normalize_doi("   "), None);
    }

    #[test]
    fn test_normalize_title_drops_punctuation() {
        assert_eq!(
            normalize_title("De novo design of PD-L1 binders: a  survey!"),
            "de novo design of pd l1 binders a survey"
        );
    }

    #[test]
    fn test_canonical_id_is_stable() {
        let a = CanonicalId::from_doi("10.1/x");
        let b = CanonicalId::from_doi("10.1/x");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, CanonicalId::from_title_year("10.1/x", None));
    }

    #[test]
    fn test_merged_record_prefers_doi_identity() {
        let mut a = record(SourceKind::PubMed, "1", "Peptide binders");
        a.doi = Some("10.1/X".into());
        let b = record(SourceKind::Scopus, "2", "Peptide binders.");
        let merged = MergedRecord::from_members(vec![b, a]).unwrap();
        assert_eq!(merged.id(), &CanonicalId::from_doi("10.1/x"));
        assert_eq!(merged.relevance(), 2);
        assert_eq!(merged.members()[0].source, SourceKind::PubMed);
    }

    #[test]
    fn test_merged_record_order_independent() {
        let a = record(SourceKind::PubMed, "1", "Alpha");
        let b = record(SourceKind::BioRxiv, "9", "Alpha");
        let x = MergedRecord::from_members(vec![a.clone(), b.clone()]).unwrap();
        let y = MergedRecord::from_members(vec![b, a]).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_empty_cluster_has_no_record() {
        assert!(MergedRecord::from_members(vec![]).is_none());
    }

    #[test]
    fn test_extraction_text_truncates_on_char_boundary() {
        let mut a = record(SourceKind::PubMed, "1", "Ωmega title");
        a.abstract_text = Some("Long abstract".into());
        let merged = MergedRecord::from_members(vec![a]).unwrap();
        assert_eq!(merged.extraction_text(5), "Ωmega");
        assert_eq!(merged.extraction_text(1000), "Ωmega title. Long abstract");
    }

    #[test]
    fn test_term_groups_and_matching() {
        let mut synonyms = BTreeMap::new();
        synonyms.insert("binder".to_string(), vec!["affinity protein".to_string()]);
        let q = SearchQuery::new("q", vec!["binder".into(), "yeast".into()], synonyms);
        assert_eq!(q.term_groups(), vec![vec!["binder", "affinity protein"], vec!["yeast"]]);
        assert_eq!(q.matched_groups("An Affinity Protein expressed in yeast"), 2);
        assert!(q.vocabulary().contains("affinity"));
    }

    #[test]
    fn test_date_range_rejects_inverted_bounds() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(DateRange::new(from, to).is_err());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("WoS".parse::<SourceKind>().unwrap(), SourceKind::WebOfScience);
        assert!("arxiv".parse::<SourceKind>().is_err());
    }
}
