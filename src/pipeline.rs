//! End-to-end article verification.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::{stream, FutureExt, StreamExt};
use serde::Serialize;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::article::{looks_like_url, ArticleFetcher, HttpArticleFetcher};
use crate::config::Settings;
use crate::credibility::CredibilityTable;
use crate::error::{LlmError, VerifyError, VerifyResult};
use crate::extraction::ClaimExtractor;
use crate::lang::LanguageDetector;
use crate::llm::{DisabledLlm, Llm, OpenAiLlm};
use crate::retrieve::EvidenceRetriever;
use crate::scoring::aggregate_nli_scores_with;
use crate::search::{searcher_from_settings, DisabledSearch, Searcher};
use crate::synthesis::{generate_verdict, no_claims_verdict};
use crate::tone::analyze_tone;
use crate::types::{Claim, Evidence, FinalVerdict, NliResult, VerificationScore};
use crate::verification::{CacheState, HttpNliLoader, NliModelLoader, NliVerifier};

/// Credibility assumed when no evidence survived filtering.
pub const NEUTRAL_CREDIBILITY: f64 = 0.5;

struct ClaimOutcome {
    score: VerificationScore,
    evidence: Vec<Evidence>,
    nli: Vec<NliResult>,
}

impl ClaimOutcome {
    fn unverified(claim_id: Uuid) -> Self {
        Self { score: VerificationScore::unverified(claim_id), evidence: Vec::new(), nli: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub llm: String,
    pub search: String,
    pub nli_model: String,
    pub nli_state: CacheState,
}

pub struct Pipeline {
    extractor: ClaimExtractor,
    retriever: EvidenceRetriever,
    verifier: NliVerifier,
    fetcher: Arc<dyn ArticleFetcher>,
    settings: Settings,
    llm_name: String,
    search_name: String,
    nli_model: String,
}

impl Pipeline {
    pub fn builder(settings: Settings) -> PipelineBuilder {
        PipelineBuilder::new(settings)
    }

    /// Pipeline wired to the providers named in `settings`.
    pub fn from_settings(settings: Settings) -> VerifyResult<Self> {
        PipelineBuilder::new(settings).build()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            llm: self.llm_name.clone(),
            search: self.search_name.clone(),
            nli_model: self.nli_model.clone(),
            nli_state: self.verifier.cache_state(),
        }
    }

    /// Verify an article given as text or as an http(s) URL.
    pub async fn verify_article(&self, text_or_url: &str) -> VerifyResult<FinalVerdict> {
        let input = text_or_url.trim();
        if input.is_empty() {
            return Err(VerifyError::InvalidInput("article text or URL cannot be empty".into()));
        }
        let deadline = Instant::now() + self.settings.pipeline_deadline();
        let text = if looks_like_url(input) { self.fetcher.fetch(input).await? } else { input.to_string() };

        let claims = self.extractor.extract_claims(&text).await?;
        let tone = analyze_tone(&text)?;
        if claims.is_empty() {
            info!("no claims extracted, article left unverified");
            return no_claims_verdict(&tone);
        }

        let tasks: Vec<_> = claims.iter().enumerate().map(|(i, claim)| async move {
            let outcome = match timeout_at(deadline, self.check_claim(claim)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(claim = %claim.id, "pipeline deadline reached, claim left unverified");
                    ClaimOutcome::unverified(claim.id)
                }
            };
            (i, outcome)
        }
        .boxed()).collect();
        let mut outcomes: Vec<(usize, ClaimOutcome)> =
            stream::iter(tasks).buffer_unordered(self.settings.claim_concurrency.max(1)).collect().await;
        outcomes.sort_by_key(|(i, _)| *i);

        let mut scores = Vec::with_capacity(claims.len());
        let mut evidence_by_claim = HashMap::with_capacity(claims.len());
        let mut nli_by_claim = HashMap::with_capacity(claims.len());
        for (claim, (_, outcome)) in claims.iter().zip(outcomes) {
            scores.push(outcome.score);
            evidence_by_claim.insert(claim.id, outcome.evidence);
            nli_by_claim.insert(claim.id, outcome.nli);
        }

        let avg_credibility = average_credibility(evidence_by_claim.values().flatten());
        generate_verdict(
            &claims,
            &scores,
            &evidence_by_claim,
            &nli_by_claim,
            &tone,
            avg_credibility,
            &self.settings.thresholds,
        )
    }

    /// Search, cross-check and score one claim. Any failure leaves the claim
    /// UNVERIFIED without affecting the others.
    async fn check_claim(&self, claim: &Claim) -> ClaimOutcome {
        let evidence = match self.retriever.search_evidence(claim).await {
            Ok(ev) => ev,
            Err(e) => {
                warn!(claim = %claim.id, error = %e, "evidence retrieval failed");
                return ClaimOutcome::unverified(claim.id);
            }
        };
        if evidence.is_empty() {
            return ClaimOutcome::unverified(claim.id);
        }

        let nli = self.verifier.verify_all(claim, &evidence).await;
        if nli.is_empty() {
            warn!(claim = %claim.id, "no NLI results");
            return ClaimOutcome { score: VerificationScore::unverified(claim.id), evidence, nli };
        }
        let weights: HashMap<Uuid, f64> = evidence.iter().map(|e| (e.id, e.credibility_score)).collect();
        let score = match aggregate_nli_scores_with(&nli, &weights, &self.settings.thresholds) {
            Ok(s) => s,
            Err(e) => {
                warn!(claim = %claim.id, error = %e, "aggregation failed");
                VerificationScore::unverified(claim.id)
            }
        };
        ClaimOutcome { score, evidence, nli }
    }
}

/// Mean credibility of all evidence, or [`NEUTRAL_CREDIBILITY`] when there is none.
pub fn average_credibility<'a>(evidence: impl IntoIterator<Item = &'a Evidence>) -> f64 {
    let (sum, n) = evidence.into_iter().fold((0.0, 0usize), |(sum, n), e| (sum + e.credibility_score, n + 1));
    if n == 0 {
        NEUTRAL_CREDIBILITY
    } else {
        sum / n as f64
    }
}

/// Collaborators left unset are built from the settings.
pub struct PipelineBuilder {
    settings: Settings,
    llm: Option<Arc<dyn Llm>>,
    searcher: Option<Arc<dyn Searcher>>,
    nli_loader: Option<Arc<dyn NliModelLoader>>,
    credibility: Option<Arc<CredibilityTable>>,
    fetcher: Option<Arc<dyn ArticleFetcher>>,
    detector: Option<Arc<dyn LanguageDetector>>,
}

impl PipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { settings, llm: None, searcher: None, nli_loader: None, credibility: None, fetcher: None, detector: None }
    }

    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn searcher(mut self, searcher: Arc<dyn Searcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }

    pub fn nli_loader(mut self, loader: Arc<dyn NliModelLoader>) -> Self {
        self.nli_loader = Some(loader);
        self
    }

    pub fn credibility(mut self, table: Arc<CredibilityTable>) -> Self {
        self.credibility = Some(table);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ArticleFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn language_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> VerifyResult<Pipeline> {
        let settings = self.settings;
        settings.validate()?;

        let llm: Arc<dyn Llm> = match self.llm {
            Some(llm) => llm,
            None => match OpenAiLlm::from_settings(&settings) {
                Ok(llm) => Arc::new(llm),
                Err(LlmError::NotConfigured) => {
                    warn!("no LLM provider configured, claims will be extracted by rules");
                    Arc::new(DisabledLlm)
                }
                Err(e) => return Err(e.into()),
            },
        };
        let searcher: Arc<dyn Searcher> = match self.searcher.or_else(|| searcher_from_settings(&settings)) {
            Some(s) => s,
            None => {
                warn!("no search provider configured, claims will stay unverified");
                Arc::new(DisabledSearch)
            }
        };
        let nli_loader = self.nli_loader.unwrap_or_else(|| Arc::new(HttpNliLoader::from_settings(&settings)));
        let credibility = match (self.credibility, &settings.source_credibility_path) {
            (Some(table), _) => table,
            (None, Some(path)) => Arc::new(CredibilityTable::from_path(Path::new(path))?),
            (None, None) => Arc::new(CredibilityTable::builtin()),
        };
        let fetcher = self.fetcher.unwrap_or_else(|| Arc::new(HttpArticleFetcher::new(settings.request_timeout())));

        let mut extractor = ClaimExtractor::new(Arc::clone(&llm), &settings);
        if let Some(detector) = self.detector {
            extractor = extractor.with_language_detector(detector);
        }
        let llm_name = llm.name().to_string();
        let search_name = searcher.name().to_string();
        let nli_model = nli_loader.model_name().to_string();
        info!(llm = %llm_name, search = %search_name, nli = %nli_model, sources = credibility.len(), "pipeline ready");

        Ok(Pipeline {
            extractor,
            retriever: EvidenceRetriever::new(searcher, credibility, &settings),
            verifier: NliVerifier::new(nli_loader, &settings),
            fetcher,
            settings,
            llm_name,
            search_name,
            nli_model,
        })
    }
}
