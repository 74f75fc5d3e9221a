//! Web search collaborators.

pub mod serper;
pub mod tavily;

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::credibility::normalize_domain;
use crate::error::SearchError;

pub use serper::Serper;
pub use tavily::Tavily;

/// One raw search result, before credibility filtering and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
    pub publish_date: Option<DateTime<Utc>>,
}

impl SearchHit {
    /// `None` when the result has no URL or no snippet.
    pub fn new(url: &str, title: &str, snippet: &str, date: Option<&str>) -> Option<Self> {
        let (url, snippet) = (url.trim(), snippet.trim());
        if url.is_empty() || snippet.is_empty() {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            title: title.trim().to_string(),
            snippet: snippet.to_string(),
            domain: normalize_domain(url),
            publish_date: date.and_then(parse_publish_date),
        })
    }
}

#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    fn name(&self) -> &str {
        "search"
    }
}

/// Used when no search API key is configured. Every claim comes back
/// without evidence and ends UNVERIFIED.
pub struct DisabledSearch;

#[async_trait]
impl Searcher for DisabledSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Picks a provider from whichever API key is configured; Serper wins when
/// both are present.
pub fn searcher_from_settings(settings: &Settings) -> Option<Arc<dyn Searcher>> {
    let num_results = settings.max_evidence_per_claim * 2;
    if let Some(key) = &settings.serper_api_key {
        return Some(Arc::new(Serper::new(key.clone(), settings.search_qps, num_results, settings.request_timeout())));
    }
    if let Some(key) = &settings.tavily_api_key {
        return Some(Arc::new(Tavily::new(key.clone(), settings.search_qps, num_results, settings.request_timeout())));
    }
    None
}

pub(crate) fn limiter(qps: u32) -> DefaultDirectRateLimiter {
    let qps = NonZeroU32::new(qps).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(qps))
}

pub(crate) fn classify_status(provider: &str, status: reqwest::StatusCode) -> SearchError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        SearchError::RateLimited { provider: provider.to_string() }
    } else {
        SearchError::Api { provider: provider.to_string(), reason: format!("HTTP {status}") }
    }
}

pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> SearchError {
    let reason = if e.is_timeout() { "request timed out".to_string() } else { e.to_string() };
    SearchError::Api { provider: provider.to_string(), reason }
}

/// Best effort; providers disagree on date formats and unknown ones are dropped.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    ["%b %d, %Y", "%Y-%m-%d", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
