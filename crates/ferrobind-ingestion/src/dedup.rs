//! Cross-source deduplication.
//!
//! Records are clustered with union-find. Two records join the same cluster
//! when their normalized DOIs match, or when their normalized titles are
//! near-identical (token Jaccard) and their publication years are close.
//! Each cluster becomes one `MergedRecord`.

use std::collections::{BTreeSet, HashMap};

use ferrobind_common::{MergedRecord, RawRecord};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DedupConfig {
    /// Minimum title token Jaccard similarity for a title match.
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f64,
    /// Largest publication-year gap a title match tolerates.
    #[serde(default = "default_max_year_gap")]
    pub max_year_gap: i32,
}

fn default_title_similarity() -> f64 { 0.85 }
fn default_max_year_gap() -> i32 { 1 }

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_similarity: default_title_similarity(),
            max_year_gap: default_max_year_gap(),
        }
    }
}

/// Disjoint-set forest with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), size: vec![1; n] }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// Token-set Jaccard similarity of two normalized titles.
pub fn title_jaccard(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    inter / union
}

fn years_compatible(a: Option<i32>, b: Option<i32>, max_gap: i32) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() <= max_gap,
        // An undated record can still match on title.
        _ => true,
    }
}

/// Cluster raw records into merged records, ranked by relevance (distinct
/// sources), then most recent publication date, then canonical id.
///
/// The result depends only on the set of input records, not their order.
pub fn deduplicate(records: Vec<RawRecord>, config: &DedupConfig) -> Vec<MergedRecord> {
    let mut records = records;
    records.sort_by(|a, b| {
        a.source.cmp(&b.source)
            .then_with(|| a.native_id.cmp(&b.native_id))
            .then_with(|| a.title.cmp(&b.title))
    });

    let n = records.len();
    let dois: Vec<Option<String>> = records.iter().map(RawRecord::normalized_doi).collect();
    let titles: Vec<String> = records.iter().map(RawRecord::normalized_title).collect();
    let years: Vec<Option<i32>> = records.iter().map(RawRecord::year).collect();

    let mut uf = UnionFind::new(n);

    // DOI-exact matches always merge.
    let mut by_doi: HashMap<&str, usize> = HashMap::new();
    for (i, doi) in dois.iter().enumerate() {
        if let Some(doi) = doi {
            match by_doi.get(doi.as_str()) {
                Some(&first) => uf.union(first, i),
                None => {
                    by_doi.insert(doi.as_str(), i);
                }
            }
        }
    }

    // Pairwise title similarity.
    for i in 0..n {
        if titles[i].is_empty() {
            continue;
        }
        for j in (i + 1)..n {
            if titles[j].is_empty() || uf.find(i) == uf.find(j) {
                continue;
            }
            if years_compatible(years[i], years[j], config.max_year_gap)
                && title_jaccard(&titles[i], &titles[j]) >= config.title_similarity
            {
                uf.union(i, j);
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<RawRecord>> = HashMap::new();
    for (i, record) in records.into_iter().enumerate() {
        let root = uf.find(i);
        clusters.entry(root).or_default().push(record);
    }

    let mut merged: Vec<MergedRecord> = clusters
        .into_values()
        .filter_map(MergedRecord::from_members)
        .collect();

    merged.sort_by(|a, b| {
        b.relevance()
            .cmp(&a.relevance())
            .then_with(|| b.latest_date().cmp(&a.latest_date()))
            .then_with(|| a.id().cmp(b.id()))
    });

    debug!(input = n, clusters = merged.len(), "Deduplicated records");
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ferrobind_common::SourceKind;

    fn rec(source: SourceKind, id: &str, title: &str, year: i32, doi: Option<&str>) -> RawRecord {
        let mut r = RawRecord::new(source, id, title);
        r.pub_date = NaiveDate::from_ymd_opt(year, 6, 1);
        r.doi = doi.map(String::from);
        r
    }

    #[test]
    fn test_doi_match_merges_regardless_of_title() {
        let a = rec(SourceKind::PubMed, "1", "Completely different", 2020, Some("10.1/ABC"));
        let b = rec(SourceKind::Scopus, "2", "Nothing alike", 2015, Some("https://doi.org/10.1/abc"));
        let merged = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].relevance(), 2);
    }

    #[test]
    fn test_title_match_within_year_gap() {
        let a = rec(SourceKind::PubMed, "1", "Peptide binders for PD-L1.", 2021, None);
        let b = rec(SourceKind::BioRxiv, "2", "Peptide Binders for PD-L1", 2020, None);
        let c = rec(SourceKind::Scopus, "3", "Peptide binders for PD-L1", 2017, None);
        let merged = deduplicate(vec![a, b, c], &DedupConfig::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].relevance(), 2);
        assert_eq!(merged[1].relevance(), 1);
    }

    #[test]
    fn test_dissimilar_records_stay_singletons() {
        let a = rec(SourceKind::PubMed, "1", "Yeast display of binders", 2021, None);
        let b = rec(SourceKind::PubMed, "2", "CHO cell expression of antibodies", 2021, None);
        let merged = deduplicate(vec![a, b], &DedupConfig::default());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_ranking_by_relevance_then_recency() {
        let old = rec(SourceKind::PubMed, "1", "Old single", 2010, None);
        let new = rec(SourceKind::PubMed, "2", "New single", 2024, None);
        let shared_a = rec(SourceKind::PubMed, "3", "Shared", 2000, Some("10.1/s"));
        let shared_b = rec(SourceKind::BioRxiv, "4", "Shared", 2000, Some("10.1/s"));
        let merged = deduplicate(vec![old, new, shared_a, shared_b], &DedupConfig::default());
        let titles: Vec<&str> = merged.iter().map(|m| m.title()).collect();
        assert_eq!(titles, vec!["Shared", "New single", "Old single"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate(vec![], &DedupConfig::default()).is_empty());
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(title_jaccard("a b c", "a b c"), 1.0);
        assert_eq!(title_jaccard("a b", "c d"), 0.0);
        assert_eq!(title_jaccard("", ""), 0.0);
    }
}
