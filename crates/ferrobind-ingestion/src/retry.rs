//! Retry with exponential backoff and a minimum-interval rate limiter.
//!
//! Both are owned by an adapter instance; nothing here is global.

use std::future::Future;
use std::time::Duration;

use ferrobind_common::FerrobindError;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Outcome of one failed request attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Timeout, connection failure, HTTP 5xx or 429. Worth retrying.
    #[error("transient: {0}")]
    Transient(String),
    /// Other 4xx, parse failures, sandbox refusals. Retrying will not help.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    pub fn from_status(status: StatusCode, context: &str) -> Self {
        let msg = format!("{context}: HTTP {status}");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            FetchError::Transient(msg)
        } else {
            FetchError::Permanent(msg)
        }
    }

    pub fn parse(msg: impl std::fmt::Display) -> Self {
        FetchError::Permanent(format!("parse failure: {msg}"))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return FetchError::Transient(e.to_string());
        }
        match e.status() {
            Some(status) => FetchError::from_status(status, "request failed"),
            None if e.is_decode() || e.is_body() => FetchError::parse(e),
            None => FetchError::Transient(e.to_string()),
        }
    }
}

impl From<FerrobindError> for FetchError {
    fn from(e: FerrobindError) -> Self {
        match e {
            FerrobindError::Http(inner) => inner.into(),
            other => FetchError::Permanent(other.to_string()),
        }
    }
}

/// Retry budget and backoff shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_max_backoff_ms() -> u64 { 8_000 }

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(base.min(self.max_backoff_ms as f64) as u64)
    }
}

/// Execute an async operation, retrying transient failures with exponential
/// backoff. Permanent failures return immediately.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                attempt += 1;
                if !e.is_transient() || attempt >= attempts {
                    return Err(e);
                }
                let backoff = policy.backoff(attempt - 1);
                tracing::warn!(
                    attempt,
                    max = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Enforces a minimum interval between consecutive requests of one adapter.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `requests_per_second <= 0` disables limiting. NaN, or a rate so
    /// small that the interval overflows `Duration`, is a config error.
    pub fn per_second(requests_per_second: f64) -> Result<Self, FerrobindError> {
        if requests_per_second.is_nan() {
            return Err(FerrobindError::Config("requests_per_second is NaN".into()));
        }
        let min_interval = if requests_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / requests_per_second).map_err(|e| {
                FerrobindError::Config(format!("requests_per_second {requests_per_second} out of range: {e}"))
            })?
        } else {
            Duration::ZERO
        };
        Ok(Self { min_interval, last: Mutex::new(None) })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot, then claim it.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
