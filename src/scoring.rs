use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::config::Thresholds;
use crate::error::{VerifyError, VerifyResult};
use crate::types::{NliResult, RelationshipLabel, Verdict, VerificationScore};

/// Weight used for evidence missing from the weight map.
pub const DEFAULT_EVIDENCE_WEIGHT: f64 = 1.0;

pub fn aggregate_nli_scores(results: &[NliResult], weights: &HashMap<Uuid, f64>) -> VerifyResult<VerificationScore> {
    aggregate_nli_scores_with(results, weights, &Thresholds::default())
}

/// Combine one claim's NLI results into a verdict, weighting each result by
/// its evidence's credibility.
pub fn aggregate_nli_scores_with(
    results: &[NliResult],
    weights: &HashMap<Uuid, f64>,
    t: &Thresholds,
) -> VerifyResult<VerificationScore> {
    let first = results
        .first()
        .ok_or_else(|| VerifyError::InvalidInput("cannot aggregate an empty result list".into()))?;
    let claim_id = first.claim_id;
    if results.iter().any(|r| r.claim_id != claim_id) {
        return Err(VerifyError::InvalidInput("results reference more than one claim".into()));
    }

    let (mut support, mut refute, mut neutral) = (0usize, 0usize, 0usize);
    let (mut total_weight, mut weighted_support, mut weighted_refute) = (0.0f64, 0.0f64, 0.0f64);
    for r in results {
        let w = weights.get(&r.evidence_id).copied().unwrap_or(DEFAULT_EVIDENCE_WEIGHT);
        if !w.is_finite() || w < 0.0 {
            return Err(VerifyError::InvalidInput(format!("evidence weight {w} must be finite and non-negative")));
        }
        total_weight += w;
        match r.label {
            RelationshipLabel::Supports => {
                support += 1;
                weighted_support += r.entailment * w;
            }
            RelationshipLabel::Refutes => {
                refute += 1;
                weighted_refute += r.contradiction * w;
            }
            RelationshipLabel::Neutral => neutral += 1,
        }
    }

    let (verdict, confidence) = if total_weight > 0.0 {
        // Each ratio is a weighted mean of probabilities; min() only absorbs rounding.
        let support_ratio = (weighted_support / total_weight).min(1.0);
        let refute_ratio = (weighted_refute / total_weight).min(1.0);
        if support_ratio > refute_ratio + t.verdict_margin {
            (Verdict::True, support_ratio * 100.0)
        } else if refute_ratio > support_ratio + t.verdict_margin {
            (Verdict::False, refute_ratio * 100.0)
        } else if support_ratio > t.misleading_floor && refute_ratio > t.misleading_floor {
            (Verdict::Misleading, t.misleading_confidence)
        } else {
            (Verdict::Unverified, t.unverified_confidence)
        }
    } else {
        (Verdict::Unverified, 0.0)
    };

    if !(0.0..=100.0).contains(&confidence) {
        return Err(VerifyError::Invariant(format!("confidence {confidence} outside [0, 100]")));
    }
    if support + refute + neutral != results.len() {
        return Err(VerifyError::Invariant("label counts do not sum to result count".into()));
    }

    info!(
        claim = %claim_id,
        results = results.len(),
        ?verdict,
        confidence,
        support,
        refute,
        neutral,
        "aggregated NLI scores"
    );
    Ok(VerificationScore {
        claim_id,
        support_count: support,
        refute_count: refute,
        neutral_count: neutral,
        confidence_score: confidence,
        verdict,
    })
}
