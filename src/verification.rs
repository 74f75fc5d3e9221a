//! Claim/evidence cross-checking with an NLI classifier.
//!
//! The classifier is loaded lazily, exactly once per [`ModelCache`]. A failed
//! load is terminal: every later call goes straight to the keyword-overlap
//! fallback without touching the loader again.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{NliError, VerifyError, VerifyResult};
use crate::segments::content_tokens;
use crate::types::{Claim, Evidence, NliResult, RelationshipLabel, NLI_SUM_TOLERANCE};

/// Index of each class in a model's logit vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOrder {
    pub contradiction: usize,
    pub neutral: usize,
    pub entailment: usize,
}

impl LabelOrder {
    /// MultiNLI checkpoints (bart-large-mnli, roberta-large-mnli, deberta-*-mnli).
    pub const MNLI: LabelOrder = LabelOrder { contradiction: 0, neutral: 1, entailment: 2 };
    /// sentence-transformers `cross-encoder/nli-*`.
    pub const CROSS_ENCODER: LabelOrder = LabelOrder { contradiction: 0, entailment: 1, neutral: 2 };
    /// `typeform/distilbert-base-uncased-mnli`.
    pub const ENTAILMENT_FIRST: LabelOrder = LabelOrder { entailment: 0, neutral: 1, contradiction: 2 };

    /// Order from label names listed by index, e.g. a model's `id2label`.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Option<Self> {
        let position = |prefix: &str| {
            labels
                .iter()
                .position(|l| l.as_ref().trim().to_lowercase().starts_with(prefix))
        };
        let order = LabelOrder {
            contradiction: position("contradict")?,
            neutral: position("neutral")?,
            entailment: position("entail")?,
        };
        let mut idx = [order.contradiction, order.neutral, order.entailment];
        idx.sort_unstable();
        (idx[0] != idx[1] && idx[1] != idx[2]).then_some(order)
    }

    /// Known order for a model family, by checkpoint name.
    pub fn for_model(model: &str) -> Option<Self> {
        let m = model.to_lowercase();
        if m.starts_with("cross-encoder/nli") {
            Some(Self::CROSS_ENCODER)
        } else if m.contains("typeform/distilbert") {
            Some(Self::ENTAILMENT_FIRST)
        } else if m.contains("mnli") {
            Some(Self::MNLI)
        } else {
            None
        }
    }

    /// `id2label` from the model, then configuration, then the family table.
    /// Unknown models fall back to MNLI order.
    pub fn resolve(model: &str, id2label: Option<&[String]>, configured: Option<&[String]>) -> Self {
        if let Some(order) = id2label.and_then(Self::from_labels) {
            return order;
        }
        if let Some(order) = configured.and_then(Self::from_labels) {
            return order;
        }
        if let Some(order) = Self::for_model(model) {
            return order;
        }
        warn!(model, "unknown NLI label order, assuming MNLI (contradiction, neutral, entailment)");
        Self::MNLI
    }

    fn max_index(&self) -> usize {
        self.contradiction.max(self.neutral).max(self.entailment)
    }
}

#[async_trait]
pub trait NliClassifier: Send + Sync {
    /// Raw logits in the model's own class order.
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<Vec<f32>, NliError>;

    fn label_order(&self) -> LabelOrder;
}

#[async_trait]
pub trait NliModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn NliClassifier>, NliError>;

    fn model_name(&self) -> &str;
}

enum Loaded {
    Ready(Arc<dyn NliClassifier>),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Unloaded,
    Loaded,
    Failed,
}

/// Lazily loaded classifier. UNLOADED moves to LOADED or FAILED once and
/// never back, except through [`ModelCache::reset_for_testing`].
pub struct ModelCache {
    loader: Arc<dyn NliModelLoader>,
    cell: OnceCell<Loaded>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn NliModelLoader>) -> Self {
        Self { loader, cell: OnceCell::new() }
    }

    /// The classifier, loading it on first use. Concurrent first callers
    /// share a single load.
    pub async fn get(&self) -> Option<Arc<dyn NliClassifier>> {
        let loaded = self
            .cell
            .get_or_init(|| async {
                let model = self.loader.model_name();
                info!(model, "loading NLI model");
                match self.loader.load().await {
                    Ok(classifier) => {
                        info!(model, "NLI model loaded");
                        Loaded::Ready(classifier)
                    }
                    Err(e) => {
                        error!(model, error = %e, "NLI model failed to load");
                        warn!("falling back to keyword matching with reduced confidence");
                        Loaded::Failed
                    }
                }
            })
            .await;
        match loaded {
            Loaded::Ready(c) => Some(Arc::clone(c)),
            Loaded::Failed => None,
        }
    }

    pub fn state(&self) -> CacheState {
        match self.cell.get() {
            None => CacheState::Unloaded,
            Some(Loaded::Ready(_)) => CacheState::Loaded,
            Some(Loaded::Failed) => CacheState::Failed,
        }
    }

    pub fn reset_for_testing(&mut self) {
        self.cell = OnceCell::new();
    }
}

/// Premise/hypothesis pair as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NliInput {
    pub premise: String,
    pub hypothesis: String,
}

pub fn format_for_nli(premise: &str, hypothesis: &str) -> VerifyResult<NliInput> {
    let (premise, hypothesis) = (premise.trim(), hypothesis.trim());
    if premise.is_empty() {
        return Err(VerifyError::InvalidInput("premise cannot be empty".into()));
    }
    if hypothesis.is_empty() {
        return Err(VerifyError::InvalidInput("hypothesis cannot be empty".into()));
    }
    Ok(NliInput { premise: premise.to_string(), hypothesis: hypothesis.to_string() })
}

pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&x| (x as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// (entailment, contradiction, neutral) probabilities from raw logits,
/// renormalized when the mapped three drift from 1.0.
pub fn scores_from_logits(logits: &[f32], order: LabelOrder) -> Result<(f64, f64, f64), NliError> {
    if logits.len() <= order.max_index() {
        return Err(NliError::Inference {
            reason: format!("expected at least {} logits, got {}", order.max_index() + 1, logits.len()),
        });
    }
    if logits.iter().any(|x| !x.is_finite()) {
        return Err(NliError::Inference { reason: "non-finite logits".into() });
    }
    let probs = softmax(logits);
    let (mut e, mut c, mut n) = (probs[order.entailment], probs[order.contradiction], probs[order.neutral]);
    let total = e + c + n;
    if (total - 1.0).abs() > NLI_SUM_TOLERANCE {
        debug!(total, "renormalizing NLI scores");
        e /= total;
        c /= total;
        n /= total;
    }
    Ok((e, c, n))
}

/// Token-overlap stand-in for the classifier. Never returns REFUTES.
pub fn keyword_fallback(claim: &Claim, evidence: &Evidence, confidence_factor: f64) -> VerifyResult<NliResult> {
    let claim_tokens = content_tokens(&claim.text);
    let evidence_tokens = content_tokens(&evidence.snippet);
    let common = claim_tokens.intersection(&evidence_tokens).count();
    let overlap = common as f64 / claim_tokens.len().max(1) as f64;

    let (e, c, n, label) = if overlap > 0.5 {
        (0.6, 0.2, 0.2, RelationshipLabel::Supports)
    } else if overlap > 0.2 {
        (0.3, 0.2, 0.5, RelationshipLabel::Neutral)
    } else {
        (0.2, 0.2, 0.6, RelationshipLabel::Neutral)
    };
    let (e, c, n) = (e * confidence_factor, c * confidence_factor, n * confidence_factor);
    let total = e + c + n;
    debug!(overlap, ?label, "keyword fallback");
    NliResult::new(claim.id, evidence.id, e / total, c / total, n / total, label)
}

pub struct NliVerifier {
    cache: ModelCache,
    fallback_factor: f64,
}

impl NliVerifier {
    pub fn new(loader: Arc<dyn NliModelLoader>, settings: &Settings) -> Self {
        Self {
            cache: ModelCache::new(loader),
            fallback_factor: settings.thresholds.fallback_confidence_factor,
        }
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    pub fn reset_for_testing(&mut self) {
        self.cache.reset_for_testing();
    }

    /// Evidence snippet is the premise, claim text the hypothesis.
    pub async fn verify_claim_against_evidence(&self, claim: &Claim, evidence: &Evidence) -> VerifyResult<NliResult> {
        if claim.text.trim().is_empty() {
            return Err(VerifyError::InvalidInput("claim text cannot be empty".into()));
        }
        let input = format_for_nli(&evidence.snippet, &claim.text)?;

        let Some(model) = self.cache.get().await else {
            return keyword_fallback(claim, evidence, self.fallback_factor);
        };
        let scored = match model.classify(&input.premise, &input.hypothesis).await {
            Ok(logits) => scores_from_logits(&logits, model.label_order()),
            Err(e) => Err(e),
        };
        match scored {
            Ok((e, c, n)) => {
                let label = RelationshipLabel::argmax(e, c, n);
                debug!(claim = %claim.id, evidence = %evidence.id, e, c, n, ?label, "NLI inference");
                NliResult::new(claim.id, evidence.id, e, c, n, label)
            }
            Err(err) => {
                warn!(error = %err, "NLI inference failed, using keyword matching");
                keyword_fallback(claim, evidence, self.fallback_factor)
            }
        }
    }

    /// One result per evidence item, checked concurrently. Items that fail
    /// are logged and left out.
    pub async fn verify_all(&self, claim: &Claim, evidence: &[Evidence]) -> Vec<NliResult> {
        join_all(evidence.iter().map(|e| self.verify_claim_against_evidence(claim, e)))
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(res) => Some(res),
                Err(e) => {
                    warn!(claim = %claim.id, error = %e, "dropping NLI result");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    id2label: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    premise: &'a str,
    hypothesis: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    logits: Vec<f32>,
}

/// Loads a classifier served over HTTP: `GET {endpoint}/info` for the label
/// map and `POST {endpoint}/classify` for inference.
pub struct HttpNliLoader {
    http: Client,
    endpoint: Option<String>,
    model: String,
    configured_order: Option<Vec<String>>,
}

impl HttpNliLoader {
    pub fn new(endpoint: Option<String>, model: String, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { http, endpoint, model, configured_order: None }
    }

    pub fn from_settings(s: &Settings) -> Self {
        let mut loader = Self::new(s.nli_endpoint.clone(), s.nli_model_name.clone(), s.request_timeout());
        loader.configured_order = s.nli_label_order.clone();
        loader
    }

    fn unavailable(&self, reason: impl Into<String>) -> NliError {
        NliError::ModelUnavailable { model: self.model.clone(), reason: reason.into() }
    }
}

#[async_trait]
impl NliModelLoader for HttpNliLoader {
    async fn load(&self) -> Result<Arc<dyn NliClassifier>, NliError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| self.unavailable("no NLI endpoint configured"))?
            .trim_end_matches('/')
            .to_string();

        let resp = self
            .http
            .get(format!("{endpoint}/info"))
            .query(&[("model", self.model.as_str())])
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(self.unavailable(format!("HTTP {}", resp.status())));
        }
        let info: ModelInfo = resp.json().await.map_err(|e| self.unavailable(e.to_string()))?;

        let id2label: Option<Vec<String>> = info.id2label.map(|m| {
            let mut pairs: Vec<(usize, String)> =
                m.into_iter().filter_map(|(k, v)| k.parse().ok().map(|i| (i, v))).collect();
            pairs.sort_by_key(|(i, _)| *i);
            pairs.into_iter().map(|(_, v)| v).collect()
        });
        let order = LabelOrder::resolve(&self.model, id2label.as_deref(), self.configured_order.as_deref());
        debug!(model = %self.model, ?order, "resolved NLI label order");

        Ok(Arc::new(HttpNliClassifier {
            http: self.http.clone(),
            endpoint,
            model: self.model.clone(),
            order,
        }))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

pub struct HttpNliClassifier {
    http: Client,
    endpoint: String,
    model: String,
    order: LabelOrder,
}

#[async_trait]
impl NliClassifier for HttpNliClassifier {
    async fn classify(&self, premise: &str, hypothesis: &str) -> Result<Vec<f32>, NliError> {
        let inference = |reason: String| NliError::Inference { reason };
        let resp = self
            .http
            .post(format!("{}/classify", self.endpoint))
            .json(&ClassifyRequest { model: &self.model, premise, hypothesis })
            .send()
            .await
            .map_err(|e| inference(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(inference(format!("HTTP {}", resp.status())));
        }
        let body: ClassifyResponse = resp.json().await.map_err(|e| inference(e.to_string()))?;
        Ok(body.logits)
    }

    fn label_order(&self) -> LabelOrder {
        self.order
    }
}
