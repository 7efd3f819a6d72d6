//! Clarivate Web of Science Starter API adapter.
//!
//!   GET https://api.clarivate.com/apis/wos-starter/v1/documents?q=...&limit=&page=
//!   header X-ApiKey
//!
//! The Starter API returns bibliographic metadata only; records carry no
//! abstract. Requires an API key.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use ferrobind_common::sandbox::SandboxClient as Client;
use ferrobind_common::{FerrobindError, RawRecord, SearchField, SearchQuery, SourceKind};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{boolean_query, paginate, parse_month, quote, AdapterOptions, Page, RequestBudget, SourceAdapter};
use crate::retry::FetchError;

const DOCUMENTS_URL: &str = "https://api.clarivate.com/apis/wos-starter/v1/documents";
/// Largest `limit` the Starter API accepts.
const MAX_PAGE_SIZE: usize = 50;

pub struct WosAdapter {
    client: Client,
    api_key: Option<SecretString>,
    options: AdapterOptions,
    budget: RequestBudget,
}

impl WosAdapter {
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

    fn page_size(&self) -> usize {
        self.options.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    #[instrument(skip(self, key))]
    async fn fetch_page(&self, key: &str, q: &str, page: usize) -> Result<Page, FetchError> {
        let limit = self.page_size();
        let params = [
            ("q", q.to_string()),
            ("db", "WOS".to_string()),
            ("limit", limit.to_string()),
            // 1-based
            ("page", (page + 1).to_string()),
        ];
        let params = &params;

        let body: serde_json::Value = self.budget.call(move || async move {
            let resp = self
                .client
                .get(DOCUMENTS_URL)?
                .header("X-ApiKey", key)
                .query(params)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(FetchError::from_status(resp.status(), "wos documents"));
            }
            resp.json::<serde_json::Value>().await.map_err(FetchError::parse)
        }).await?;

        let (records, total) = parse_documents(&body);
        let hits = body["hits"].as_array().map_or(0, Vec::len);
        let has_more = hits > 0 && page * limit + hits < total;
        debug!(page, returned = records.len(), total, "Web of Science page");
        Ok(Page { records, has_more })
    }
}

/// Render WoS advanced search syntax, e.g. `TS=("peptide binder" OR "peptide ligand") AND PY=2020-2023`.
pub fn build_q(query: &SearchQuery) -> String {
    let tags: Vec<&str> = if query.fields().is_empty() {
        vec!["TS"]
    } else {
        query
            .fields()
            .iter()
            .map(|f| match f {
                SearchField::Title    => "TI",
                SearchField::Abstract => "TS",
                SearchField::Author   => "AU",
            })
            .collect()
    };
    let mut q = boolean_query(query, |term| {
        let quoted = quote(term);
        let parts: Vec<String> = tags.iter().map(|t| format!("{t}=({quoted})")).collect();
        if parts.len() == 1 { parts.concat() } else { format!("({})", parts.join(" OR ")) }
    });
    if let Some(range) = query.date_range() {
        q.push_str(&format!(" AND PY={}-{}", range.from.year(), range.to.year()));
    }
    q
}

/// Map a documents response onto raw records. Returns the records and the
/// total hit count.
pub fn parse_documents(body: &serde_json::Value) -> (Vec<RawRecord>, usize) {
    let total = body["metadata"]["total"].as_u64().unwrap_or(0) as usize;
    let records = body["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|h| {
                    let uid = h["uid"].as_str().filter(|u| !u.is_empty())?;
                    let title = h["title"].as_str().unwrap_or("").trim();
                    if title.is_empty() {
                        return None;
                    }
                    let mut r = RawRecord::new(SourceKind::WebOfScience, uid, title);
                    r.authors = h["names"]["authors"]
                        .as_array()
                        .map(|a| {
                            a.iter()
                                .filter_map(|n| n["displayName"].as_str().or_else(|| n["wosStandard"].as_str()))
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default();
                    r.pub_date = publish_date(&h["source"]);
                    r.doi = h["identifiers"]["doi"].as_str().filter(|d| !d.is_empty()).map(String::from);
                    r.journal = h["source"]["sourceTitle"].as_str().map(String::from);
                    r.url = h["links"]["record"].as_str().map(String::from);
                    r.keywords = h["keywords"]["authorKeywords"]
                        .as_array()
                        .map(|k| k.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default();
                    Some(r)
                })
                .collect()
        })
        .unwrap_or_default();
    (records, total)
}

fn publish_date(source: &serde_json::Value) -> Option<NaiveDate> {
    let year = source["publishYear"]
        .as_i64()
        .map(|y| y as i32)
        .or_else(|| source["publishYear"].as_str().and_then(|y| y.parse().ok()))?;
    // publishMonth is free text such as "JAN", "MAR 15" or "SPR"
    let month = source["publishMonth"]
        .as_str()
        .and_then(|m| parse_month(m.split_whitespace().next().unwrap_or("")))
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[async_trait]
impl SourceAdapter for WosAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::WebOfScience
    }

    #[instrument(skip(self, query), fields(question = query.question()))]
    async fn search(&self, query: &SearchQuery, page_limit: usize) -> ferrobind_common::Result<Vec<RawRecord>> {
        let Some(key) = &self.api_key else {
            warn!("Web of Science API key not configured; skipping source");
            return Err(FerrobindError::source_unavailable(SourceKind::WebOfScience, "no API key configured"));
        };
        let key = key.expose_secret();
        let q = build_q(query);
        let q = q.as_str();
        paginate(SourceKind::WebOfScience, page_limit, self.options.max_results, move |page| {
            self.fetch_page(key, q, page)
        })
        .await
    }
}
