//! bioRxiv preprint adapter.
//!
//! Uses the bioRxiv details API:
//!   https://api.biorxiv.org/details/biorxiv/{from}/{to}/{cursor}/json
//!
//! The API has no free-text search, so each page of the date window is
//! filtered client-side against the query's term groups.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use ferrobind_common::sandbox::SandboxClient as Client;
use ferrobind_common::{RawRecord, SearchField, SearchQuery, SourceKind};
use tracing::{debug, instrument};

use super::{paginate, AdapterOptions, Page, RequestBudget, SourceAdapter};
use crate::retry::FetchError;

const DETAILS_URL: &str = "https://api.biorxiv.org/details/biorxiv";
/// Fixed page size of the details endpoint.
const API_PAGE_SIZE: usize = 100;
const DEFAULT_WINDOW_DAYS: i64 = 90;

pub struct BioRxivAdapter {
    client: Client,
    options: AdapterOptions,
    budget: RequestBudget,
}

impl BioRxivAdapter {
    pub fn new(options: AdapterOptions) -> ferrobind_common::Result<Self> {
        Ok(Self {
            client: Client::new()?,
            budget: RequestBudget::new(&options)?,
            options,
        })
    }

    #[instrument(skip(self, query))]
    async fn fetch_page(&self, query: &SearchQuery, from: NaiveDate, to: NaiveDate, page: usize) -> Result<Page, FetchError> {
        let cursor = page * API_PAGE_SIZE;
        let url = format!("{DETAILS_URL}/{from}/{to}/{cursor}/json");
        let url = url.as_str();

        let body: serde_json::Value = self.budget.call(move || async move {
            let resp = self.client.get(url)?.send().await?;
            if !resp.status().is_success() {
                return Err(FetchError::from_status(resp.status(), "biorxiv details"));
            }
            resp.json::<serde_json::Value>().await.map_err(FetchError::parse)
        }).await?;

        let (records, scanned) = parse_details(&body, query);
        let total = body["messages"][0]["total"]
            .as_u64()
            .or_else(|| body["messages"][0]["total"].as_str().and_then(|t| t.parse().ok()))
            .map(|t| t as usize);
        let has_more = match total {
            Some(total) => cursor + scanned < total,
            None => scanned == API_PAGE_SIZE,
        };

        debug!(scanned, kept = records.len(), has_more, "bioRxiv page filtered");
        Ok(Page { records, has_more })
    }
}

/// Date window to scan: the query's range, or the last 90 days.
pub fn window(query: &SearchQuery, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match query.date_range() {
        Some(range) => (range.from, range.to),
        None => (today - Duration::days(DEFAULT_WINDOW_DAYS), today),
    }
}

/// Number of matched term groups a preprint needs to be kept.
fn required_matches(query: &SearchQuery) -> usize {
    query.terms().len().min(2)
}

/// Map a details response onto raw records, keeping only preprints that
/// match the query. Returns the kept records and the number scanned.
pub fn parse_details(body: &serde_json::Value, query: &SearchQuery) -> (Vec<RawRecord>, usize) {
    let collection = body["collection"].as_array().cloned().unwrap_or_default();
    let needed = required_matches(query);

    let records = collection
        .iter()
        .filter_map(|item| {
            let doi = item["doi"].as_str().filter(|d| !d.is_empty())?;
            let title = item["title"].as_str().unwrap_or("").trim();
            if title.is_empty() {
                return None;
            }
            let abstract_text = item["abstract"].as_str().unwrap_or("").trim();
            let authors_raw = item["authors"].as_str().unwrap_or("");

            let haystack = match query.fields().is_empty() {
                true => format!("{title} {abstract_text}"),
                false => query
                    .fields()
                    .iter()
                    .map(|f| match f {
                        SearchField::Title    => title,
                        SearchField::Abstract => abstract_text,
                        SearchField::Author   => authors_raw,
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            };
            if query.matched_groups(&haystack) < needed {
                return None;
            }

            let version = item["version"].as_str().unwrap_or("1");
            let mut record = RawRecord::new(SourceKind::BioRxiv, doi, title);
            record.abstract_text = (!abstract_text.is_empty()).then(|| abstract_text.to_string());
            record.authors = authors_raw
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            record.pub_date = item["date"]
                .as_str()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            record.doi = Some(doi.to_string());
            record.url = Some(format!("https://www.biorxiv.org/content/{doi}v{version}"));
            record.journal = Some("bioRxiv".to_string());
            record.keywords = item["category"]
                .as_str()
                .filter(|c| !c.is_empty())
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            Some(record)
        })
        .collect();

    (records, collection.len())
}

#[async_trait]
impl SourceAdapter for BioRxivAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::BioRxiv
    }

    #[instrument(skip(self, query), fields(question = query.question()))]
    async fn search(&self, query: &SearchQuery, page_limit: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        let (from, to) = window(query, Utc::now().date_naive());
        paginate(SourceKind::BioRxiv, page_limit, self.options.max_results, move |page| {
            self.fetch_page(query, from, to, page)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrobind_common::DateRange;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn query(terms: &[&str]) -> SearchQuery {
        SearchQuery::new("q", terms.iter().map(|t| t.to_string()).collect(), BTreeMap::new())
    }

    fn body() -> serde_json::Value {
        json!({
            "messages": [{"status": "ok", "total": 2}],
            "collection": [
                {
                    "doi": "10.1101/2024.01.01.000001",
                    "title": "A peptide binder expressed in yeast",
                    "abstract": "We used a yeast expression system.",
                    "authors": "Doe, J.; Roe, R.;",
                    "date": "2024-01-03",
                    "version": "2",
                    "category": "bioengineering"
                },
                {
                    "doi": "10.1101/2024.01.01.000002",
                    "title": "Cortical neurons in zebrafish",
                    "abstract": "Unrelated.",
                    "authors": "Poe, P.",
                    "date": "2024-01-04",
                    "version": "1",
                    "category": "neuroscience"
                }
            ]
        })
    }

    #[test]
    fn test_parse_details_filters_client_side() {
        let (records, scanned) = parse_details(&body(), &query(&["peptide binder", "yeast"]));
        assert_eq!(scanned, 2);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.native_id, "10.1101/2024.01.01.000001");
        assert_eq!(r.authors, vec!["Doe, J.", "Roe, R."]);
        assert_eq!(r.pub_date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(r.url.as_deref(), Some("https://www.biorxiv.org/content/10.1101/2024.01.01.000001v2"));
    }

    #[test]
    fn test_single_term_query_needs_one_match() {
        let (records, _) = parse_details(&body(), &query(&["zebrafish"]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Cortical neurons in zebrafish");
    }

    #[test]
    fn test_default_window_is_ninety_days() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let (from, to) = window(&query(&["x"]), today);
        assert_eq!((to - from).num_days(), 90);

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
        )
        .unwrap();
        let q = query(&["x"]).with_date_range(range);
        assert_eq!(window(&q, today), (range.from, range.to));
    }
}
