//! Error types for the verification pipeline.

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A scoring invariant was broken. Always a defect, never user error.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Nli(#[from] NliError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("article fetch failed: {reason}")]
    Fetch { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    NotConfigured,

    #[error("LLM request failed: {reason}")]
    Request { reason: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider} search failed: {reason}")]
    Api { provider: String, reason: String },
}

impl SearchError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SearchError::RateLimited { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NliError {
    #[error("NLI model {model} unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("NLI inference failed: {reason}")]
    Inference { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
}
