use std::time::Duration;

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{classify_status, limiter, transport_error, SearchHit, Searcher};
use crate::error::SearchError;

const ENDPOINT: &str = "https://google.serper.dev/search";
const PROVIDER: &str = "serper";

#[derive(Debug, Deserialize)]
struct SerperItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperResp {
    #[serde(default)]
    organic: Vec<SerperItem>,
}

pub struct Serper {
    http: Client,
    key: String,
    limiter: DefaultDirectRateLimiter,
    num_results: usize,
}

impl Serper {
    pub fn new(key: String, qps: u32, num_results: usize, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { http, key, limiter: limiter(qps), num_results }
    }
}

#[async_trait]
impl Searcher for Serper {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.limiter.until_ready().await;
        let resp = self
            .http
            .post(ENDPOINT)
            .header("X-API-KEY", &self.key)
            .json(&serde_json::json!({ "q": query, "num": self.num_results }))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !resp.status().is_success() {
            return Err(classify_status(PROVIDER, resp.status()));
        }
        let body = resp.json::<SerperResp>().await.map_err(|e| transport_error(PROVIDER, e))?;
        let hits: Vec<SearchHit> = body
            .organic
            .iter()
            .filter_map(|i| SearchHit::new(&i.link, &i.title, &i.snippet, i.date.as_deref()))
            .take(self.num_results)
            .collect();
        debug!(provider = PROVIDER, hits = hits.len(), "search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
