//! Literature source adapters.

pub mod biorxiv;
pub mod pubmed;
pub mod scopus;
pub mod wos;

use std::future::Future;

use async_trait::async_trait;
use ferrobind_common::{FerrobindError, RawRecord, SearchQuery, SourceKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::retry::{with_retry, FetchError, RateLimiter, RetryPolicy};

pub use biorxiv::BioRxivAdapter;
pub use pubmed::PubMedAdapter;
pub use scopus::ScopusAdapter;
pub use wos::WosAdapter;

/// Common interface for all literature sources.
///
/// One call returns the records for one query, already capped to the
/// adapter's result limit. Failures after the retry budget surface as
/// `FerrobindError::SourceUnavailable`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn search(
        &self,
        query: &SearchQuery,
        page_limit: usize,
    ) -> ferrobind_common::Result<Vec<RawRecord>>;
}

/// Per-instance tuning shared by every adapter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdapterOptions {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_requests_per_second() -> f64 { 3.0 }
fn default_page_size() -> usize { 25 }
fn default_max_results() -> usize { 50 }

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            page_size: default_page_size(),
            max_results: default_max_results(),
            retry: RetryPolicy::default(),
        }
    }
}

/// One page of results.
#[derive(Debug, Default)]
pub(crate) struct Page {
    pub records: Vec<RawRecord>,
    /// The source reports more results past this page.
    pub has_more: bool,
}

/// Rate limiting and retry state owned by one adapter instance.
#[derive(Debug)]
pub(crate) struct RequestBudget {
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl RequestBudget {
    pub fn new(options: &AdapterOptions) -> Result<Self, FerrobindError> {
        Ok(Self {
            limiter: RateLimiter::per_second(options.requests_per_second)?,
            retry: options.retry.clone(),
        })
    }

    /// Run `op` under the rate limiter, retrying transient failures.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let op = &op;
        let limiter = &self.limiter;
        with_retry(&self.retry, move || async move {
            limiter.acquire().await;
            op().await
        })
        .await
    }
}

/// Walk pages `0..page_limit` until a short page or `max_results` records.
///
/// A failure on the first page makes the whole source unavailable; a later
/// failure keeps what was already fetched.
pub(crate) async fn paginate<F, Fut>(
    kind: SourceKind,
    page_limit: usize,
    max_results: usize,
    mut fetch_page: F,
) -> ferrobind_common::Result<Vec<RawRecord>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Page, FetchError>>,
{
    let mut records = Vec::new();
    for page in 0..page_limit.max(1) {
        match fetch_page(page).await {
            Ok(p) => {
                let has_more = p.has_more;
                records.extend(p.records);
                debug!(source = %kind, page, total = records.len(), "Fetched page");
                if !has_more || records.len() >= max_results {
                    break;
                }
            }
            Err(e) if page == 0 => {
                return Err(FerrobindError::source_unavailable(kind, e.to_string()));
            }
            Err(e) => {
                warn!(source = %kind, page, error = %e, "Page fetch failed; keeping earlier pages");
                break;
            }
        }
    }
    records.truncate(max_results);
    Ok(records)
}

/// Quote multi-word terms for boolean query languages.
pub(crate) fn quote(term: &str) -> String {
    if term.contains(char::is_whitespace) || term.contains('-') {
        format!("\"{}\"", term.replace('"', ""))
    } else {
        term.to_string()
    }
}

/// Render `(a OR b) AND (c)` with `render_term` applied to every member.
pub(crate) fn boolean_query(query: &SearchQuery, render_term: impl Fn(&str) -> String) -> String {
    query
        .term_groups()
        .iter()
        .map(|group| {
            let alts: Vec<String> = group.iter().map(|t| render_term(t)).collect();
            if alts.len() == 1 {
                alts.into_iter().next().unwrap_or_default()
            } else {
                format!("({})", alts.join(" OR "))
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Parse `YYYY-MM-DD`, `YYYY-MM` or `YYYY`, defaulting missing parts to 1.
pub(crate) fn parse_loose_date(s: &str) -> Option<chrono::NaiveDate> {
    let mut parts = s.trim().splitn(3, '-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next().and_then(|m| m.trim().parse().ok()).unwrap_or(1);
    let day: u32 = parts
        .next()
        .and_then(|d| d.trim().get(..2).unwrap_or(d).parse().ok())
        .unwrap_or(1);
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| chrono::NaiveDate::from_ymd_opt(year, month, 1))
        .or_else(|| chrono::NaiveDate::from_ymd_opt(year, 1, 1))
}

/// Map `Jan`/`January`/`01` onto a month number.
pub(crate) fn parse_month(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = s.get(..3)?.to_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}
