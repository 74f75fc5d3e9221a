pub mod openai;

use async_trait::async_trait;

use crate::error::LlmError;

pub use openai::OpenAiLlm;

/// Text-generation collaborator.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str {
        "llm"
    }
}

/// Stand-in used when no provider is configured; every call fails, which
/// routes claim extraction to the rule-based path.
pub struct DisabledLlm;

#[async_trait]
impl Llm for DisabledLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
