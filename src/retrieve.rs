use std::sync::Arc;

use futures::{stream, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{Settings, Thresholds};
use crate::credibility::{normalize_domain, CredibilityTable};
use crate::error::SearchError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::search::{SearchHit, Searcher};
use crate::segments::content_tokens;
use crate::types::{Claim, Evidence};

const MAX_QUERY_CHARS: usize = 200;

/// Strip quote characters and cut to 200 chars at a word boundary.
pub fn optimize_query_for_search(claim_text: &str) -> String {
    let query: String = claim_text.trim().chars().filter(|c| *c != '"' && *c != '\'').collect();
    if query.chars().count() <= MAX_QUERY_CHARS {
        return query;
    }
    let head: String = query.chars().take(MAX_QUERY_CHARS).collect();
    match head.rfind(' ') {
        Some(cut) => head[..cut].to_string(),
        None => head,
    }
}

/// Lowercased host without `www.`; empty when the URL has no host.
pub fn extract_domain(url: &str) -> String {
    normalize_domain(url)
}

/// Jaccard similarity of stop-word-filtered token sets, boosted when one
/// text contains the other.
pub fn calculate_relevance(claim_text: &str, snippet: &str, substring_boost: f64) -> f64 {
    let claim_tokens = content_tokens(claim_text);
    let snippet_tokens = content_tokens(snippet);
    if claim_tokens.is_empty() || snippet_tokens.is_empty() {
        return 0.0;
    }
    let common = claim_tokens.intersection(&snippet_tokens).count() as f64;
    let union = claim_tokens.union(&snippet_tokens).count() as f64;
    let mut score = common / union;

    let (c, s) = (claim_text.to_lowercase(), snippet.to_lowercase());
    if s.contains(&c) || c.contains(&s) {
        score = (score * substring_boost).min(1.0);
    }
    score
}

/// Keep hits whose source meets the credibility threshold. Relevance is
/// left at zero for the caller to fill in.
pub fn filter_trusted_sources(hits: &[SearchHit], table: &CredibilityTable, minimum: f64) -> Vec<Evidence> {
    let mut kept = Vec::with_capacity(hits.len());
    for hit in hits {
        let cred = table.lookup_source_credibility(&hit.domain);
        if cred.credibility_score < minimum {
            debug!(domain = %cred.domain, score = cred.credibility_score, minimum, "below credibility threshold");
            continue;
        }
        match Evidence::new(&hit.url, &cred.domain, &hit.snippet, hit.publish_date, cred.credibility_score, 0.0) {
            Ok(e) => kept.push(e),
            Err(e) => warn!(url = %hit.url, error = %e, "skipping malformed search hit"),
        }
    }
    info!(from = hits.len(), to = kept.len(), minimum, "filtered search hits");
    kept
}

pub struct EvidenceRetriever {
    searcher: Arc<dyn Searcher>,
    credibility: Arc<CredibilityTable>,
    retry: RetryPolicy,
    minimum_credibility: f64,
    max_evidence: usize,
    thresholds: Thresholds,
}

impl EvidenceRetriever {
    pub fn new(searcher: Arc<dyn Searcher>, credibility: Arc<CredibilityTable>, settings: &Settings) -> Self {
        Self {
            searcher,
            credibility,
            retry: settings.retry_policy(),
            minimum_credibility: settings.minimum_credibility_threshold,
            max_evidence: settings.max_evidence_per_claim,
            thresholds: settings.thresholds.clone(),
        }
    }

    /// Ranked evidence for one claim. An empty result means "unverifiable";
    /// search failures propagate after rate-limit retries are exhausted.
    pub async fn search_evidence(&self, claim: &Claim) -> Result<Vec<Evidence>, SearchError> {
        let query = optimize_query_for_search(&claim.text);
        if query.is_empty() {
            warn!(claim = %claim.id, "empty search query");
            return Ok(Vec::new());
        }
        debug!(claim = %claim.id, %query, provider = self.searcher.name(), "searching evidence");

        let hits = retry_with_backoff(self.retry, "search", SearchError::is_rate_limit, |_| {
            self.searcher.search(&query)
        })
        .await?;
        if hits.is_empty() {
            warn!(claim = %claim.id, "no search results");
            return Ok(Vec::new());
        }

        let mut evidence = filter_trusted_sources(&hits, &self.credibility, self.minimum_credibility);
        for e in &mut evidence {
            e.relevance_score = calculate_relevance(&claim.text, &e.snippet, self.thresholds.substring_boost);
        }
        let t = &self.thresholds;
        let combined = |e: &Evidence| t.relevance_weight * e.relevance_score + t.credibility_weight * e.credibility_score;
        evidence.sort_by(|a, b| combined(b).total_cmp(&combined(a)));
        evidence.truncate(self.max_evidence);
        info!(claim = %claim.id, evidence = evidence.len(), hits = hits.len(), "evidence ranked");
        Ok(evidence)
    }

    /// Evidence for every claim, in input order. A failed search yields an
    /// empty list for that claim only.
    pub async fn search_all(&self, claims: &[Claim], concurrency: usize) -> Vec<Vec<Evidence>> {
        let tasks = claims.iter().enumerate().map(|(i, c)| async move {
            let found = match self.search_evidence(c).await {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(claim = %c.id, error = %e, "evidence retrieval failed");
                    Vec::new()
                }
            };
            (i, found)
        });
        let mut out: Vec<(usize, Vec<Evidence>)> =
            stream::iter(tasks).buffer_unordered(concurrency.max(1)).collect().await;
        out.sort_by_key(|(i, _)| *i);
        out.into_iter().map(|(_, ev)| ev).collect()
    }
}
