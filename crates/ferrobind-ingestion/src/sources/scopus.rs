//! Elsevier Scopus Search API adapter.
//!
//!   GET https://api.elsevier.com/content/search/scopus?query=...&start=&count=
//!   header X-ELS-APIKey
//!
//! Requires an API key; without one every search is refused up front.

use async_trait::async_trait;
use chrono::Datelike;
use ferrobind_common::sandbox::SandboxClient as Client;
use ferrobind_common::{FerrobindError, RawRecord, SearchField, SearchQuery, SourceKind};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{boolean_query, paginate, parse_loose_date, quote, AdapterOptions, Page, RequestBudget, SourceAdapter};
use crate::retry::FetchError;

const SEARCH_URL: &str = "https://api.elsevier.com/content/search/scopus";

pub struct ScopusAdapter {
    client: Client,
    api_key: Option<SecretString>,
    options: AdapterOptions,
    budget: RequestBudget,
}

impl ScopusAdapter {
    pub fn new(api_key: Option<String>, options: AdapterOptions) -> ferrobind_common::Result<Self> {
        Ok(Self {
            client: Client::new()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(SecretString::from),
            budget: RequestBudget::new(&options)?,
            options,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, key))]
    async fn fetch_page(&self, key: &str, search: &str, page: usize) -> Result<Page, FetchError> {
        let start = page * self.options.page_size;
        let params = [
            ("query", search.to_string()),
            ("start", start.to_string()),
            ("count", self.options.page_size.to_string()),
            ("sort", "relevancy".to_string()),
        ];
        let params = &params;

        let body: serde_json::Value = self.budget.call(move || async move {
            let resp = self
                .client
                .get(SEARCH_URL)?
                .header("X-ELS-APIKey", key)
                .header("Accept", "application/json")
                .query(params)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(FetchError::from_status(resp.status(), "scopus search"));
            }
            resp.json::<serde_json::Value>().await.map_err(FetchError::parse)
        }).await?;

        let (records, total) = parse_search_results(&body);
        let entries = body["search-results"]["entry"].as_array().map_or(0, Vec::len);
        let has_more = entries > 0 && start + entries < total;
        debug!(start, returned = records.len(), total, "Scopus page");
        Ok(Page { records, has_more })
    }
}

/// Render Scopus boolean search syntax, e.g.
/// `TITLE-ABS-KEY("peptide binder" OR "peptide ligand") AND PUBYEAR > 2019`.
pub fn build_search(query: &SearchQuery) -> String {
    let fields: Vec<&str> = if query.fields().is_empty() {
        vec!["TITLE-ABS-KEY"]
    } else {
        query
            .fields()
            .iter()
            .map(|f| match f {
                SearchField::Title    => "TITLE",
                SearchField::Abstract => "TITLE-ABS-KEY",
                SearchField::Author   => "AUTH",
            })
            .collect()
    };
    let mut search = boolean_query(query, |term| {
        let quoted = format!("\"{}\"", quote(term).trim_matches('"'));
        let parts: Vec<String> = fields.iter().map(|f| format!("{f}({quoted})")).collect();
        if parts.len() == 1 { parts.concat() } else { format!("({})", parts.join(" OR ")) }
    });
    if let Some(range) = query.date_range() {
        search.push_str(&format!(
            " AND PUBYEAR > {} AND PUBYEAR < {}",
            range.from.year() - 1,
            range.to.year() + 1
        ));
    }
    search
}

/// Map a Scopus search response onto raw records. Returns the records and
/// the total result count the API reports.
pub fn parse_search_results(body: &serde_json::Value) -> (Vec<RawRecord>, usize) {
    let results = &body["search-results"];
    let total = results["opensearch:totalResults"]
        .as_str()
        .and_then(|t| t.parse().ok())
        .or_else(|| results["opensearch:totalResults"].as_u64().map(|t| t as usize))
        .unwrap_or(0);

    let records = results["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.get("error").is_none())
                .filter_map(|e| {
                    let title = e["dc:title"].as_str().unwrap_or("").trim();
                    let native_id = e["dc:identifier"]
                        .as_str()
                        .or_else(|| e["eid"].as_str())?
                        .trim_start_matches("SCOPUS_ID:")
                        .to_string();
                    if title.is_empty() {
                        return None;
                    }
                    let mut r = RawRecord::new(SourceKind::Scopus, native_id, title);
                    r.abstract_text = e["dc:description"]
                        .as_str()
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(String::from);
                    r.authors = e["dc:creator"]
                        .as_str()
                        .filter(|a| !a.is_empty())
                        .map(|a| vec![a.to_string()])
                        .unwrap_or_default();
                    r.pub_date = e["prism:coverDate"].as_str().and_then(parse_loose_date);
                    r.doi = e["prism:doi"].as_str().filter(|d| !d.is_empty()).map(String::from);
                    r.journal = e["prism:publicationName"].as_str().map(String::from);
                    r.url = e["link"]
                        .as_array()
                        .and_then(|links| {
                            links.iter().find(|l| l["@ref"].as_str() == Some("scopus"))
                        })
                        .and_then(|l| l["@href"].as_str())
                        .or_else(|| e["prism:url"].as_str())
                        .map(String::from);
                    r.keywords = e["authkeywords"]
                        .as_str()
                        .map(|k| {
                            k.split(" | ")
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(r)
                })
                .collect()
        })
        .unwrap_or_default();

    (records, total)
}

#[async_trait]
impl SourceAdapter for ScopusAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Scopus
    }

    #[instrument(skip(self, query), fields(question = query.question()))]
    async fn search(&self, query: &SearchQuery, page_limit: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        let Some(key) = &self.api_key else {
            warn!("Scopus API key not configured; skipping source");
            return Err(FerrobindError::source_unavailable(SourceKind::Scopus, "no API key configured"));
        };
        let key = key.expose_secret();
        let search = build_search(query);
        let search = search.as_str();
        paginate(SourceKind::Scopus, page_limit, self.options.max_results, move |page| {
            self.fetch_page(key, search, page)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ferrobind_common::DateRange;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let adapter = ScopusAdapter::new(None, AdapterOptions::default()).unwrap();
        assert!(!adapter.has_credentials());
        let q = SearchQuery::new("q", vec!["binder".into()], BTreeMap::new());
        let err = adapter.search(&q, 1).await.unwrap_err();
        assert!(matches!(err, FerrobindError::SourceUnavailable { kind: SourceKind::Scopus, .. }));
    }

    #[test]
    fn test_build_search_with_years() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        )
        .unwrap();
        let q = SearchQuery::new("q", vec!["peptide binder".into(), "yeast".into()], BTreeMap::new())
            .with_date_range(range);
        assert_eq!(
            build_search(&q),
            "TITLE-ABS-KEY(\"peptide binder\") AND TITLE-ABS-KEY(\"yeast\") AND PUBYEAR > 2019 AND PUBYEAR < 2024"
        );
    }

    #[test]
    fn test_parse_search_results() {
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "31",
                "entry": [{
                    "dc:identifier": "SCOPUS_ID:85100000000",
                    "dc:title": "Affinity purification of a peptide binder",
                    "dc:description": "Purified by Ni-NTA chromatography.",
                    "dc:creator": "Smith J.",
                    "prism:coverDate": "2022-05-01",
                    "prism:doi": "10.1016/j.x.2022.01",
                    "prism:publicationName": "J. Biotech",
                    "authkeywords": "binder | IMAC",
                    "link": [{"@ref": "scopus", "@href": "https://www.scopus.com/x"}]
                }]
            }
        });
        let (records, total) = parse_search_results(&body);
        assert_eq!(total, 31);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.native_id, "85100000000");
        assert_eq!(r.keywords, vec!["binder", "IMAC"]);
        assert_eq!(r.pub_date, NaiveDate::from_ymd_opt(2022, 5, 1));
        assert_eq!(r.url.as_deref(), Some("https://www.scopus.com/x"));
    }

    #[test]
    fn test_empty_result_set() {
        let body = json!({
            "search-results": {
                "opensearch:totalResults": "0",
                "entry": [{"@_fa": "true", "error": "Result set was empty"}]
            }
        });
        let (records, total) = parse_search_results(&body);
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }
}
