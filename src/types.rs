use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{VerifyError, VerifyResult};

/// Tolerance on the three NLI probabilities summing to one.
pub const NLI_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipLabel {
    Supports,
    Refutes,
    Neutral,
}

impl RelationshipLabel {
    /// Label of the largest score. Ties resolve Supports, Refutes, Neutral.
    pub fn argmax(entailment: f64, contradiction: f64, neutral: f64) -> Self {
        if entailment >= contradiction && entailment >= neutral {
            RelationshipLabel::Supports
        } else if contradiction >= neutral {
            RelationshipLabel::Refutes
        } else {
            RelationshipLabel::Neutral
        }
    }

    /// Display priority for evidence cards; lower sorts first.
    pub fn card_priority(self) -> u8 {
        match self {
            RelationshipLabel::Refutes => 0,
            RelationshipLabel::Supports => 1,
            RelationshipLabel::Neutral => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallVerdict {
    LikelyTrue,
    LikelyFalse,
    Misleading,
    Unverified,
}

impl fmt::Display for OverallVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallVerdict::LikelyTrue => "LIKELY_TRUE",
            OverallVerdict::LikelyFalse => "LIKELY_FALSE",
            OverallVerdict::Misleading => "MISLEADING",
            OverallVerdict::Unverified => "UNVERIFIED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCategory {
    Trusted,
    Mainstream,
    Questionable,
    Unreliable,
}

impl SourceCategory {
    pub fn for_score(score: f64) -> Self {
        if score >= 0.8 {
            SourceCategory::Trusted
        } else if score >= 0.5 {
            SourceCategory::Mainstream
        } else if score >= 0.3 {
            SourceCategory::Questionable
        } else {
            SourceCategory::Unreliable
        }
    }
}

fn check_unit(name: &str, v: f64) -> VerifyResult<()> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(VerifyError::InvalidInput(format!("{name} must be in [0, 1], got {v}")))
    }
}

fn check_percent(name: &str, v: f64) -> VerifyResult<()> {
    if (0.0..=100.0).contains(&v) {
        Ok(())
    } else {
        Err(VerifyError::Invariant(format!("{name} must be in [0, 100], got {v}")))
    }
}

fn non_empty(name: &str, v: &str) -> VerifyResult<String> {
    let t = v.trim();
    if t.is_empty() {
        Err(VerifyError::InvalidInput(format!("{name} cannot be empty")))
    } else {
        Ok(t.to_string())
    }
}

/// An atomic, checkable assertion pulled out of an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: Uuid,
    pub text: String,
    pub context: String,
    pub importance: f64,
}

impl Claim {
    pub fn new(text: &str, context: &str, importance: f64) -> VerifyResult<Self> {
        check_unit("importance", importance)?;
        Ok(Self {
            id: Uuid::new_v4(),
            text: non_empty("claim text", text)?,
            context: context.trim().to_string(),
            importance,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: Uuid,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub source_domain: String,
    pub snippet: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub credibility_score: f64,
    pub relevance_score: f64,
}

impl Evidence {
    pub fn new(
        source_url: &str,
        source_domain: &str,
        snippet: &str,
        publish_date: Option<DateTime<Utc>>,
        credibility_score: f64,
        relevance_score: f64,
    ) -> VerifyResult<Self> {
        check_unit("credibility score", credibility_score)?;
        check_unit("relevance score", relevance_score)?;
        Ok(Self {
            id: Uuid::new_v4(),
            source_url: non_empty("source URL", source_url)?,
            source_domain: non_empty("source domain", source_domain)?,
            snippet: non_empty("snippet", snippet)?,
            publish_date,
            credibility_score,
            relevance_score,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NliResult {
    #[serde(rename = "claimID")]
    pub claim_id: Uuid,
    #[serde(rename = "evidenceID")]
    pub evidence_id: Uuid,
    #[serde(rename = "entailmentScore")]
    pub entailment: f64,
    #[serde(rename = "contradictionScore")]
    pub contradiction: f64,
    #[serde(rename = "neutralScore")]
    pub neutral: f64,
    pub label: RelationshipLabel,
}

impl NliResult {
    /// Fails with `Invariant` when the scores do not sum to one or the label
    /// is not the one with the largest score.
    pub fn new(
        claim_id: Uuid,
        evidence_id: Uuid,
        entailment: f64,
        contradiction: f64,
        neutral: f64,
        label: RelationshipLabel,
    ) -> VerifyResult<Self> {
        for (name, v) in [
            ("entailment", entailment),
            ("contradiction", contradiction),
            ("neutral", neutral),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(VerifyError::Invariant(format!(
                    "{name} probability {v} outside [0, 1]"
                )));
            }
        }
        let total = entailment + contradiction + neutral;
        if (total - 1.0).abs() > NLI_SUM_TOLERANCE {
            return Err(VerifyError::Invariant(format!(
                "NLI scores must sum to 1.0 (±{NLI_SUM_TOLERANCE}), got {total}"
            )));
        }
        let max = entailment.max(contradiction).max(neutral);
        let labelled = match label {
            RelationshipLabel::Supports => entailment,
            RelationshipLabel::Refutes => contradiction,
            RelationshipLabel::Neutral => neutral,
        };
        if labelled < max {
            return Err(VerifyError::Invariant(format!(
                "label {label:?} does not match highest score {:?}",
                RelationshipLabel::argmax(entailment, contradiction, neutral)
            )));
        }
        Ok(Self { claim_id, evidence_id, entailment, contradiction, neutral, label })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationScore {
    #[serde(rename = "claimID")]
    pub claim_id: Uuid,
    pub support_count: usize,
    pub refute_count: usize,
    pub neutral_count: usize,
    pub confidence_score: f64,
    pub verdict: Verdict,
}

impl VerificationScore {
    pub fn unverified(claim_id: Uuid) -> Self {
        Self {
            claim_id,
            support_count: 0,
            refute_count: 0,
            neutral_count: 0,
            confidence_score: 0.0,
            verdict: Verdict::Unverified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneScore {
    pub emotional_intensity: f64,
    pub sensationalism_score: f64,
    pub manipulative_phrases: Vec<String>,
    pub objectivity_score: f64,
}

impl ToneScore {
    /// Objectivity is derived, never supplied, so it is always the exact
    /// complement of sensationalism.
    pub fn new(
        emotional_intensity: f64,
        sensationalism_score: f64,
        manipulative_phrases: Vec<String>,
    ) -> VerifyResult<Self> {
        for (name, v) in [
            ("emotional intensity", emotional_intensity),
            ("sensationalism", sensationalism_score),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(VerifyError::Invariant(format!("{name} {v} outside [0, 1]")));
            }
        }
        Ok(Self {
            emotional_intensity,
            sensationalism_score,
            manipulative_phrases,
            objectivity_score: 1.0 - sensationalism_score,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCredibility {
    pub domain: String,
    pub credibility_score: f64,
    pub category: SourceCategory,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SourceCredibility {
    /// Fails when `category` is not the bucket `credibility_score` falls in.
    pub fn new(
        domain: &str,
        credibility_score: f64,
        category: SourceCategory,
        last_updated: Option<DateTime<Utc>>,
    ) -> VerifyResult<Self> {
        let domain = non_empty("domain", domain)?.to_lowercase();
        check_unit("credibility score", credibility_score)?;
        let expected = SourceCategory::for_score(credibility_score);
        if category != expected {
            return Err(VerifyError::InvalidInput(format!(
                "category {category:?} does not match score {credibility_score} (expected {expected:?})"
            )));
        }
        Ok(Self { domain, credibility_score, category, last_updated })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimVerdict {
    pub claim: Claim,
    pub score: VerificationScore,
    pub supporting_evidence: Vec<Evidence>,
    pub contradicting_evidence: Vec<Evidence>,
}

impl ClaimVerdict {
    pub fn verdict(&self) -> Verdict {
        self.score.verdict
    }

    pub fn confidence(&self) -> f64 {
        self.score.confidence_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceCard {
    pub claim: String,
    pub evidence_snippet: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub source_name: String,
    pub relationship: RelationshipLabel,
    pub highlighted_discrepancies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVerdict {
    pub overall_verdict: OverallVerdict,
    pub confidence_score: f64,
    pub factual_accuracy_score: f64,
    pub emotional_manipulation_score: f64,
    pub claim_breakdown: Vec<ClaimVerdict>,
    pub evidence_cards: Vec<EvidenceCard>,
    pub explanation: String,
}

impl FinalVerdict {
    pub fn new(
        overall_verdict: OverallVerdict,
        confidence_score: f64,
        factual_accuracy_score: f64,
        emotional_manipulation_score: f64,
        claim_breakdown: Vec<ClaimVerdict>,
        evidence_cards: Vec<EvidenceCard>,
        explanation: &str,
    ) -> VerifyResult<Self> {
        check_percent("confidence score", confidence_score)?;
        check_percent("factual accuracy score", factual_accuracy_score)?;
        check_percent("emotional manipulation score", emotional_manipulation_score)?;
        let explanation = explanation.trim();
        if explanation.is_empty() {
            return Err(VerifyError::Invariant("explanation cannot be empty".into()));
        }
        Ok(Self {
            overall_verdict,
            confidence_score,
            factual_accuracy_score,
            emotional_manipulation_score,
            claim_breakdown,
            evidence_cards,
            explanation: explanation.to_string(),
        })
    }
}
