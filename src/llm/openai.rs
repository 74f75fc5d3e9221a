use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use tracing::debug;

use super::Llm;
use crate::config::Settings;
use crate::error::LlmError;

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Chat-completions client for any OpenAI-compatible endpoint
/// (OpenAI, Groq, or a self-hosted server).
#[derive(Clone)]
pub struct OpenAiLlm {
    client: Client<OpenAIConfig>,
    model: String,
    provider: &'static str,
}

impl OpenAiLlm {
    pub fn new(model: String, base_url: Option<String>, api_key: Option<String>, provider: &'static str) -> Self {
        let mut cfg = OpenAIConfig::default();
        if let Some(url) = base_url { cfg = cfg.with_api_base(url); }
        if let Some(key) = api_key { cfg = cfg.with_api_key(key); }
        Self { client: Client::with_config(cfg), model, provider }
    }

    /// Provider preference: self-hosted, then Groq, then OpenAI.
    pub fn from_settings(s: &Settings) -> Result<Self, LlmError> {
        if let Some(url) = &s.self_hosted_api_url {
            return Ok(Self::new(s.self_hosted_model.clone(), Some(url.clone()), s.self_hosted_api_key.clone(), "self-hosted"));
        }
        if let Some(key) = &s.groq_api_key {
            return Ok(Self::new(s.groq_model.clone(), Some(GROQ_API_BASE.to_string()), Some(key.clone()), "groq"));
        }
        if let Some(key) = &s.openai_api_key {
            return Ok(Self::new(s.openai_model.clone(), None, Some(key.clone()), "openai"));
        }
        Err(LlmError::NotConfigured)
    }
}

#[async_trait]
impl Llm for OpenAiLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let req_err = |e: async_openai::error::OpenAIError| LlmError::Request { reason: e.to_string() };
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.1)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(req_err)?
                .into()])
            .build()
            .map_err(req_err)?;

        let response = self.client.chat().create(request).await.map_err(req_err)?;
        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        debug!(provider = self.provider, model = %self.model, chars = text.len(), "completion received");
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_preference_order() {
        let mut s = Settings::default();
        assert!(matches!(OpenAiLlm::from_settings(&s), Err(LlmError::NotConfigured)));

        s.openai_api_key = Some("sk-test".into());
        assert_eq!(OpenAiLlm::from_settings(&s).unwrap().name(), "openai");

        s.groq_api_key = Some("gsk-test".into());
        assert_eq!(OpenAiLlm::from_settings(&s).unwrap().name(), "groq");

        s.self_hosted_api_url = Some("http://localhost:8000/v1".into());
        assert_eq!(OpenAiLlm::from_settings(&s).unwrap().name(), "self-hosted");
    }
}
