#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use newsverify_rs::article::ArticleFetcher;
use newsverify_rs::credibility::CredibilityTable;
use newsverify_rs::error::{LlmError, NliError, SearchError, VerifyError, VerifyResult};
use newsverify_rs::llm::Llm;
use newsverify_rs::pipeline::Pipeline;
use newsverify_rs::search::{SearchHit, Searcher};
use newsverify_rs::verification::{LabelOrder, NliClassifier, NliModelLoader};
use newsverify_rs::Settings;

pub const SOURCES: &str = r#"{
  "defaultCredibilityScore": 0.5,
  "sources": {
    "reuters.com": { "credibilityScore": 0.95 },
    "apnews.com": { "credibilityScore": 0.9 },
    "rumours.example": { "credibilityScore": 0.1 }
  }
}"#;

/// MNLI-order logits (contradiction, neutral, entailment).
pub const ENTAILS: [f32; 3] = [-3.0, -2.0, 4.0];
pub const CONTRADICTS: [f32; 3] = [4.0, -2.0, -3.0];

pub struct FakeLlm {
    // maps each prompt to a response
    pub handler: Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>,
    pub calls: AtomicU32,
}

impl FakeLlm {
    pub fn replying(response: &str) -> Self {
        let response = response.to_string();
        Self { handler: Box::new(move |_| Ok(response.clone())), calls: AtomicU32::new(0) }
    }
}

#[async_trait]
impl Llm for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(prompt)
    }

    fn name(&self) -> &str {
        "fake-llm"
    }
}

pub struct FakeSearcher {
    pub handler: Box<dyn Fn(&str) -> Result<Vec<SearchHit>, SearchError> + Send + Sync>,
    pub delay: Option<Duration>,
}

impl FakeSearcher {
    pub fn returning(hits: Vec<SearchHit>) -> Self {
        Self { handler: Box::new(move |_| Ok(hits.clone())), delay: None }
    }
}

#[async_trait]
impl Searcher for FakeSearcher {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        (self.handler)(query)
    }

    fn name(&self) -> &str {
        "fake-search"
    }
}

pub struct FakeClassifier {
    pub handler: Box<dyn Fn(&str, &str) -> Vec<f32> + Send + Sync>,
}

#[async_trait]
impl NliClassifier for FakeClassifier {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<Vec<f32>, NliError> {
        Ok((self.handler)(premise, hypothesis))
    }

    fn label_order(&self) -> LabelOrder {
        LabelOrder::MNLI
    }
}

/// Loader for a fake classifier; `None` simulates missing weights.
pub struct FakeLoader {
    pub classifier: Option<Arc<FakeClassifier>>,
}

impl FakeLoader {
    pub fn with(handler: impl Fn(&str, &str) -> Vec<f32> + Send + Sync + 'static) -> Self {
        Self { classifier: Some(Arc::new(FakeClassifier { handler: Box::new(handler) })) }
    }

    pub fn broken() -> Self {
        Self { classifier: None }
    }
}

#[async_trait]
impl NliModelLoader for FakeLoader {
    async fn load(&self) -> Result<Arc<dyn NliClassifier>, NliError> {
        match &self.classifier {
            Some(c) => Ok(c.clone() as Arc<dyn NliClassifier>),
            None => Err(NliError::ModelUnavailable { model: "fake-nli".into(), reason: "no weights".into() }),
        }
    }

    fn model_name(&self) -> &str {
        "fake-nli"
    }
}

pub struct FakeFetcher {
    pub body: Option<String>,
}

#[async_trait]
impl ArticleFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> VerifyResult<String> {
        self.body.clone().ok_or_else(|| VerifyError::Fetch { reason: format!("{url} unreachable") })
    }
}

pub fn hit(url: &str, snippet: &str) -> SearchHit {
    SearchHit::new(url, "headline", snippet, Some("2024-02-01")).unwrap()
}

pub fn llm_claims(claims: &[(&str, f64)]) -> String {
    claims
        .iter()
        .map(|(text, importance)| format!("CLAIM: {text}\nIMPORTANCE: {importance}\nCONTEXT: {text}"))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn test_settings() -> Settings {
    Settings { retry_base_delay_ms: 1, max_retries: 2, ..Settings::default() }
}

pub fn pipeline(
    settings: Settings,
    llm: FakeLlm,
    searcher: FakeSearcher,
    loader: FakeLoader,
    fetcher: FakeFetcher,
) -> Pipeline {
    Pipeline::builder(settings)
        .llm(Arc::new(llm))
        .searcher(Arc::new(searcher))
        .nli_loader(Arc::new(loader))
        .credibility(Arc::new(CredibilityTable::from_json_str(SOURCES).unwrap()))
        .fetcher(Arc::new(fetcher))
        .build()
        .unwrap()
}
