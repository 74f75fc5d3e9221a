//! Runtime settings and scoring thresholds.
//!
//! `Settings` is built once at startup and injected into every stage. Layers,
//! lowest priority first: built-in defaults, an optional TOML file, then
//! environment variables (a `.env` file is honoured through `dotenv`).

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_CLAIMS_PER_ARTICLE: usize = 10;
pub const DEFAULT_MAX_EVIDENCE_PER_CLAIM: usize = 5;
pub const DEFAULT_MINIMUM_CREDIBILITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_NLI_MODEL_NAME: &str = "facebook/bart-large-mnli";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_claims_per_article: usize,
    pub max_evidence_per_claim: usize,
    pub minimum_credibility_threshold: f64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Base delay of the exponential backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    pub nli_model_name: String,
    /// Explicit logit order, e.g. `["contradiction", "neutral", "entailment"]`.
    pub nli_label_order: Option<Vec<String>>,
    pub nli_endpoint: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    /// OpenAI-compatible base URL of a self-hosted model server.
    pub self_hosted_api_url: Option<String>,
    pub self_hosted_api_key: Option<String>,
    pub self_hosted_model: String,

    pub serper_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub search_qps: u32,

    pub source_credibility_path: Option<String>,

    pub claim_concurrency: usize,
    pub pipeline_deadline_secs: u64,

    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_claims_per_article: DEFAULT_MAX_CLAIMS_PER_ARTICLE,
            max_evidence_per_claim: DEFAULT_MAX_EVIDENCE_PER_CLAIM,
            minimum_credibility_threshold: DEFAULT_MINIMUM_CREDIBILITY_THRESHOLD,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: 1000,
            nli_model_name: DEFAULT_NLI_MODEL_NAME.to_string(),
            nli_label_order: None,
            nli_endpoint: None,
            openai_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
            groq_api_key: None,
            groq_model: "mixtral-8x7b-32768".to_string(),
            self_hosted_api_url: None,
            self_hosted_api_key: None,
            self_hosted_model: "local".to_string(),
            serper_api_key: None,
            tavily_api_key: None,
            search_qps: 5,
            source_credibility_path: None,
            claim_concurrency: 8,
            pipeline_deadline_secs: 120,
            thresholds: Thresholds::default(),
        }
    }
}

impl Settings {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut settings = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Read {
            path: "<toml>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Overlay values from a key lookup. Taking a closure keeps tests off the
    /// real process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            key: &'static str,
            raw: Option<String>,
        ) -> Result<Option<T>, ConfigError>
        where
            T::Err: std::fmt::Display,
        {
            match raw {
                None => Ok(None),
                Some(v) => v.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid {
                    key,
                    reason: format!("{v:?}: {e}"),
                }),
            }
        }
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = parsed("MAX_CLAIMS_PER_ARTICLE", lookup("MAX_CLAIMS_PER_ARTICLE"))? {
            self.max_claims_per_article = v;
        }
        if let Some(v) = parsed("MAX_EVIDENCE_PER_CLAIM", lookup("MAX_EVIDENCE_PER_CLAIM"))? {
            self.max_evidence_per_claim = v;
        }
        if let Some(v) = parsed(
            "MINIMUM_CREDIBILITY_THRESHOLD",
            lookup("MINIMUM_CREDIBILITY_THRESHOLD"),
        )? {
            self.minimum_credibility_threshold = v;
        }
        if let Some(v) = parsed("REQUEST_TIMEOUT_SECONDS", lookup("REQUEST_TIMEOUT_SECONDS"))? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = parsed("MAX_RETRIES", lookup("MAX_RETRIES"))? {
            self.max_retries = v;
        }
        if let Some(v) = parsed("PIPELINE_DEADLINE_SECONDS", lookup("PIPELINE_DEADLINE_SECONDS"))? {
            self.pipeline_deadline_secs = v;
        }
        if let Some(v) = parsed("SEARCH_QPS", lookup("SEARCH_QPS"))? {
            self.search_qps = v;
        }
        if let Some(v) = non_empty("NLI_MODEL_NAME") {
            self.nli_model_name = v;
        }
        if let Some(v) = non_empty("NLI_LABEL_ORDER") {
            self.nli_label_order = Some(v.split(',').map(|s| s.trim().to_lowercase()).collect());
        }
        if let Some(v) = non_empty("NLI_ENDPOINT") {
            self.nli_endpoint = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = non_empty("OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = non_empty("GROQ_API_KEY") {
            self.groq_api_key = Some(v);
        }
        if let Some(v) = non_empty("SELF_HOSTED_API_URL") {
            self.self_hosted_api_url = Some(v);
        }
        if let Some(v) = non_empty("SELF_HOSTED_API_KEY") {
            self.self_hosted_api_key = Some(v);
        }
        if let Some(v) = non_empty("SERPER_API_KEY") {
            self.serper_api_key = Some(v);
        }
        if let Some(v) = non_empty("TAVILY_API_KEY") {
            self.tavily_api_key = Some(v);
        }
        if let Some(v) = non_empty("SOURCE_CREDIBILITY_PATH") {
            self.source_credibility_path = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };
        if self.max_claims_per_article == 0 {
            return invalid("max_claims_per_article", "must be greater than 0");
        }
        if self.max_evidence_per_claim == 0 {
            return invalid("max_evidence_per_claim", "must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.minimum_credibility_threshold) {
            return invalid("minimum_credibility_threshold", "must be between 0.0 and 1.0");
        }
        if self.request_timeout_secs == 0 {
            return invalid("request_timeout_secs", "must be greater than 0");
        }
        if self.search_qps == 0 {
            return invalid("search_qps", "must be greater than 0");
        }
        if self.claim_concurrency == 0 {
            return invalid("claim_concurrency", "must be greater than 0");
        }
        if let Some(order) = &self.nli_label_order {
            if order.len() != 3 {
                return invalid("nli_label_order", "expected exactly three labels");
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }

    /// `max_retries` is the attempt ceiling; at least one attempt is always made.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Decision constants used by aggregation, ranking and synthesis.
///
/// The defaults carry no documented derivation; they are kept as named,
/// overridable values rather than re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Ratio lead needed for a TRUE/FALSE claim verdict.
    pub verdict_margin: f64,
    /// Both ratios above this means MISLEADING.
    pub misleading_floor: f64,
    pub misleading_confidence: f64,
    pub unverified_confidence: f64,

    pub relevance_weight: f64,
    pub credibility_weight: f64,
    pub substring_boost: f64,

    pub fallback_confidence_factor: f64,

    pub evidence_match_weight: f64,
    pub source_credibility_weight: f64,
    pub writing_style_weight: f64,
    pub misleading_penalty: f64,
    pub majority_false_factor: f64,

    pub likely_false_fraction: f64,
    pub low_score: f64,
    pub misleading_fraction: f64,
    pub high_score: f64,
    pub likely_true_fraction: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            verdict_margin: 0.3,
            misleading_floor: 0.2,
            misleading_confidence: 50.0,
            unverified_confidence: 30.0,
            relevance_weight: 0.7,
            credibility_weight: 0.3,
            substring_boost: 1.5,
            fallback_confidence_factor: 0.7,
            evidence_match_weight: 0.6,
            source_credibility_weight: 0.2,
            writing_style_weight: 0.2,
            misleading_penalty: 20.0,
            majority_false_factor: 0.5,
            likely_false_fraction: 0.4,
            low_score: 40.0,
            misleading_fraction: 0.3,
            high_score: 65.0,
            likely_true_fraction: 0.6,
        }
    }
}
