//! Turning a URL into article text.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{VerifyError, VerifyResult};

static DROPPED_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|head|nav|footer)\b[^>]*>.*?</(script|style|noscript|head|nav|footer)>")
        .unwrap()
});
static BLOCK_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?(p|br|div|h[1-6]|li|article|section)\b[^>]*>").unwrap());
static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n+").unwrap());

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> VerifyResult<String>;
}

/// True for absolute http(s) URLs; anything else is treated as article text.
pub fn looks_like_url(input: &str) -> bool {
    let input = input.trim();
    if input.contains(char::is_whitespace) {
        return false;
    }
    url::Url::parse(input).map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some()).unwrap_or(false)
}

/// Crude HTML to text: drops non-content blocks, keeps paragraph breaks so
/// sentence splitting still works.
pub fn html_to_text(html: &str) -> String {
    let text = DROPPED_BLOCKS.replace_all(html, " ");
    let text = BLOCK_BREAKS.replace_all(&text, "\n\n");
    let text = TAGS.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">");
    let text = SPACES.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
}

pub struct HttpArticleFetcher {
    http: Client,
}

impl HttpArticleFetcher {
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { http }
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> VerifyResult<String> {
        debug!(%url, "fetching article");
        let fetch_err = |reason: String| VerifyError::Fetch { reason };
        let resp = self.http.get(url).send().await.map_err(|e| fetch_err(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("{url} returned HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| fetch_err(e.to_string()))?;
        let text = html_to_text(&body);
        if text.is_empty() {
            return Err(fetch_err(format!("{url} has no readable text")));
        }
        info!(%url, chars = text.len(), "article fetched");
        Ok(text)
    }
}
