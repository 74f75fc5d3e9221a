use std::time::Duration;

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{classify_status, limiter, transport_error, SearchHit, Searcher};
use crate::error::SearchError;

const ENDPOINT: &str = "https://api.tavily.com/search";
const PROVIDER: &str = "tavily";

#[derive(Debug, Deserialize)]
struct TavilyItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResp {
    #[serde(default)]
    results: Vec<TavilyItem>,
}

pub struct Tavily {
    http: Client,
    key: String,
    limiter: DefaultDirectRateLimiter,
    num_results: usize,
}

impl Tavily {
    pub fn new(key: String, qps: u32, num_results: usize, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { http, key, limiter: limiter(qps), num_results }
    }
}

#[async_trait]
impl Searcher for Tavily {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        self.limiter.until_ready().await;
        let payload = serde_json::json!({
            "api_key": self.key,
            "query": query,
            "max_results": self.num_results,
            "search_depth": "basic",
            "include_answer": false,
            "include_raw_content": false,
        });
        let resp = self
            .http
            .post(ENDPOINT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !resp.status().is_success() {
            return Err(classify_status(PROVIDER, resp.status()));
        }
        let body = resp.json::<TavilyResp>().await.map_err(|e| transport_error(PROVIDER, e))?;
        let hits: Vec<SearchHit> = body
            .results
            .iter()
            .filter_map(|i| SearchHit::new(&i.url, &i.title, &i.content, i.published_date.as_deref()))
            .take(self.num_results)
            .collect();
        debug!(provider = PROVIDER, hits = hits.len(), "search complete");
        Ok(hits)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
