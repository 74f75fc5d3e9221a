use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{VerifyError, VerifyResult};
use crate::lang::{detect_or_default, LanguageDetector, ScriptDetector};
use crate::llm::Llm;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::segments::{context_window, split_sentences, ContextWindow};
use crate::types::Claim;

const OPINION_INDICATORS: &[&str] = &[
    "i think", "i believe", "in my opinion", "i feel", "should", "must", "ought to", "need to",
    "probably", "maybe", "perhaps", "possibly", "seems like", "appears to be",
];

const SUBJECTIVE_WORDS: &[&str] = &[
    "best", "worst", "greatest", "terrible", "awful", "amazing", "wonderful", "horrible",
    "fantastic", "beautiful", "ugly", "good", "bad", "better", "worse",
];

const FACTUAL_KEYWORDS: &[&str] = &[
    "said", "reported", "announced", "confirmed", "revealed", "according to", "study",
    "research", "data", "statistics", "percent", "%", "million", "billion", "year", "date",
    "government", "official", "company", "organization",
];

static CLAIM_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)CLAIM:\s*(.+)").unwrap());
static IMPORTANCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)IMPORTANCE:\s*([-\d.]+)").unwrap());
static CONTEXT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)CONTEXT:\s*(.+?)(?:\n\n|$)").unwrap());
static HAS_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());
static HAS_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static CAPITALIZED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\b").unwrap());

/// Sentences of this many chars or fewer never become rule-based claims.
const MIN_SENTENCE_CHARS: usize = 10;
const NEIGHBOURS: ContextWindow = ContextWindow { left: 1, right: 1 };

/// A parsed but not yet validated claim: text, importance, context.
pub type RawClaim = (String, f64, String);

pub fn build_extraction_prompt(article: &str, language: &str) -> String {
    format!(
        "You are a fact-checking assistant. Your task is to extract atomic, verifiable factual claims from the following article.

INSTRUCTIONS:
1. Extract ONLY factual claims that can be verified (e.g., \"The GDP grew by 5% in 2023\")
2. DO NOT extract opinions, subjective statements, or predictions (e.g., \"This is the best policy\")
3. Each claim should be atomic (one fact per claim) and self-contained
4. Assign an importance score (0.0 to 1.0) to each claim based on its significance to the article's main point
5. Provide brief context for each claim (1-2 sentences from the article)
6. The article language is \"{language}\"; write claims in that language

FORMAT YOUR RESPONSE AS:
CLAIM: [claim text]
IMPORTANCE: [score between 0.0 and 1.0]
CONTEXT: [brief context]
---

ARTICLE TEXT:
{}

EXTRACTED CLAIMS:
",
        article.trim()
    )
}

/// Parse `CLAIM:`/`IMPORTANCE:`/`CONTEXT:` blocks separated by `---`.
/// Blocks without a claim line are skipped. Importance is clamped to [0, 1]
/// and defaults to 0.5.
pub fn parse_llm_response(response: &str) -> Vec<RawClaim> {
    let mut out = Vec::new();
    for block in response.split("---").map(str::trim).filter(|b| !b.is_empty()) {
        let Some(text) = CLAIM_LINE.captures(block).map(|c| c[1].trim().to_string()) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let importance = IMPORTANCE_LINE
            .captures(block)
            .and_then(|c| c[1].parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(0.5);
        let context = CONTEXT_BLOCK
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        out.push((text, importance, context));
    }
    debug!(claims = out.len(), "parsed LLM response");
    out
}

/// Heuristic filter for verifiable statements. Opinion markers always
/// reject; a factual keyword accepts even alongside subjective language.
pub fn is_factual_claim(claim: &str) -> bool {
    let lower = claim.to_lowercase();
    if OPINION_INDICATORS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    if FACTUAL_KEYWORDS.iter().any(|w| lower.contains(w)) {
        return true;
    }
    if SUBJECTIVE_WORDS.iter().any(|w| lower.contains(w)) {
        return false;
    }
    claim.chars().count() >= 25
}

/// Importance in [0.1, 1.0] from position, keyword density, specificity
/// and length.
pub fn calculate_importance(claim: &str, article: &str) -> f64 {
    let claim_lower = claim.to_lowercase();
    let article_lower = article.to_lowercase();

    let position = match article_lower.find(&claim_lower) {
        Some(byte_pos) => {
            let before = article_lower[..byte_pos].chars().count() as f64;
            let total = article_lower.chars().count().max(1) as f64;
            1.0 - (before / total) * 0.5
        }
        // Not verbatim in the article (LLM paraphrase).
        None => 0.7,
    };

    let keywords = FACTUAL_KEYWORDS.iter().filter(|w| claim_lower.contains(*w)).count();
    let keyword = (keywords as f64 * 0.15).min(0.5);

    let mut specificity = 0.0;
    if HAS_DIGIT.is_match(claim) {
        specificity += 0.2;
    }
    if HAS_YEAR.is_match(claim) {
        specificity += 0.15;
    }
    if CAPITALIZED.find_iter(claim).count() >= 2 {
        specificity += 0.15;
    }

    let len = claim.chars().count();
    let length_bonus = if len > 100 {
        0.1
    } else if len > 50 {
        0.05
    } else {
        0.0
    };

    (position + keyword + specificity + length_bonus).min(1.0).max(0.1)
}

/// Sentence-split fallback used when the LLM is unavailable or returns
/// nothing parseable.
pub fn rule_based_extraction(article: &str) -> Vec<RawClaim> {
    let sentences = split_sentences(article, MIN_SENTENCE_CHARS);
    let mut claims: Vec<RawClaim> = sentences
        .iter()
        .enumerate()
        .filter(|(_, s)| is_factual_claim(s))
        .map(|(i, s)| {
            (s.clone(), calculate_importance(s, article), context_window(&sentences, i, &NEIGHBOURS))
        })
        .collect();

    if claims.is_empty() {
        claims = sentences
            .iter()
            .take(3)
            .filter(|s| s.chars().count() >= 20)
            .map(|s| (s.clone(), calculate_importance(s, article), s.clone()))
            .collect();
    }
    info!(claims = claims.len(), "rule-based extraction");
    claims
}

pub struct ClaimExtractor {
    llm: Arc<dyn Llm>,
    detector: Arc<dyn LanguageDetector>,
    retry: RetryPolicy,
    max_claims: usize,
}

impl ClaimExtractor {
    pub fn new(llm: Arc<dyn Llm>, settings: &Settings) -> Self {
        Self {
            llm,
            detector: Arc::new(ScriptDetector),
            retry: settings.retry_policy(),
            max_claims: settings.max_claims_per_article,
        }
    }

    pub fn with_language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Claims sorted by importance, highest first, at most `max_claims_per_article`.
    pub async fn extract_claims(&self, article: &str) -> VerifyResult<Vec<Claim>> {
        let article = article.trim();
        if article.is_empty() {
            return Err(VerifyError::InvalidInput("article text cannot be empty".into()));
        }
        info!(chars = article.len(), llm = self.llm.name(), "extracting claims");

        let language = detect_or_default(self.detector.as_ref(), article);
        let prompt = build_extraction_prompt(article, &language);
        let raw = match retry_with_backoff(self.retry, "llm.generate", |_| true, |_| self.llm.generate(&prompt)).await {
            Ok(response) => {
                let parsed = parse_llm_response(&response);
                if parsed.is_empty() {
                    warn!("LLM returned no parseable claims, using rule-based extraction");
                    rule_based_extraction(article)
                } else {
                    parsed
                }
            }
            Err(e) => {
                warn!(error = %e, "LLM extraction failed, using rule-based extraction");
                rule_based_extraction(article)
            }
        };

        let mut claims: Vec<Claim> = raw
            .into_iter()
            .filter_map(|(text, importance, context)| match Claim::new(&text, &context, importance) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(error = %e, "dropping malformed claim");
                    None
                }
            })
            .collect();
        claims.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        if claims.len() > self.max_claims {
            debug!(from = claims.len(), to = self.max_claims, "truncating claims");
            claims.truncate(self.max_claims);
        }
        if claims.is_empty() && article.len() > 100 {
            warn!("no claims extracted from a non-trivial article");
        }
        info!(claims = claims.len(), "claims extracted");
        Ok(claims)
    }
}
