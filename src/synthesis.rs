//! Article-level verdict from per-claim results and tone.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Thresholds;
use crate::error::{VerifyError, VerifyResult};
use crate::types::{
    Claim, ClaimVerdict, Evidence, EvidenceCard, FinalVerdict, NliResult, OverallVerdict, RelationshipLabel,
    ToneScore, Verdict, VerificationScore,
};

pub const NO_CLAIMS_EXPLANATION: &str = "No factual claims could be extracted from this article for verification.";
const GENERIC_DISCREPANCY: &str = "Evidence contradicts the claim";
const EXPLANATION_CLAIM_CHARS: usize = 100;

const NEGATION_PAIRS: &[(&str, &str)] = &[
    ("is", "is not"),
    ("was", "was not"),
    ("has", "has not"),
    ("have", "have not"),
    ("did", "did not"),
    ("does", "does not"),
    ("will", "will not"),
    ("can", "cannot"),
    ("true", "false"),
    ("yes", "no"),
    ("confirmed", "denied"),
    ("increased", "decreased"),
    ("rose", "fell"),
];

struct PairMatcher {
    positive: &'static str,
    negative: &'static str,
    positive_re: Regex,
    negative_re: Regex,
}

static PAIR_MATCHERS: LazyLock<Vec<PairMatcher>> = LazyLock::new(|| {
    let word = |w: &str| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w)));
    NEGATION_PAIRS
        .iter()
        .filter_map(|&(positive, negative)| {
            Some(PairMatcher { positive, negative, positive_re: word(positive).ok()?, negative_re: word(negative).ok()? })
        })
        .collect()
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct VerdictCounts {
    true_: usize,
    false_: usize,
    misleading: usize,
    unverified: usize,
}

impl VerdictCounts {
    fn of(scores: &[VerificationScore]) -> Self {
        scores.iter().fold(Self::default(), |mut c, s| {
            match s.verdict {
                Verdict::True => c.true_ += 1,
                Verdict::False => c.false_ += 1,
                Verdict::Misleading => c.misleading += 1,
                Verdict::Unverified => c.unverified += 1,
            }
            c
        })
    }

    fn total(&self) -> usize {
        self.true_ + self.false_ + self.misleading + self.unverified
    }
}

/// Weighted evidence/credibility/style score in [0, 100], after penalties.
pub fn calculate_final_score(
    scores: &[VerificationScore],
    tone: &ToneScore,
    avg_credibility: f64,
    t: &Thresholds,
) -> VerifyResult<f64> {
    if scores.is_empty() {
        return Err(VerifyError::InvalidInput("no verification scores to combine".into()));
    }
    if !(0.0..=1.0).contains(&avg_credibility) {
        return Err(VerifyError::InvalidInput(format!("average credibility {avg_credibility} outside [0, 1]")));
    }
    let counts = VerdictCounts::of(scores);
    let total = counts.total() as f64;

    let evidence_match = counts.true_ as f64 / total * 100.0;
    let writing_style = (1.0 - tone.sensationalism_score) * 100.0;
    let mut score = t.evidence_match_weight * evidence_match
        + t.source_credibility_weight * avg_credibility * 100.0
        + t.writing_style_weight * writing_style;

    if counts.misleading > 0 {
        score -= counts.misleading as f64 / total * t.misleading_penalty;
    }
    if counts.false_ as f64 > total / 2.0 {
        score *= t.majority_false_factor;
    }
    let score = score.clamp(0.0, 100.0);
    debug!(score, evidence_match, writing_style, ?counts, "final score");
    Ok(score)
}

/// First matching rule wins; see the ordering below.
pub fn determine_overall_verdict(scores: &[VerificationScore], final_score: f64, t: &Thresholds) -> OverallVerdict {
    let counts = VerdictCounts::of(scores);
    let total = counts.total() as f64;
    if total == 0.0 {
        return OverallVerdict::Unverified;
    }
    if counts.false_ as f64 > total * t.likely_false_fraction || final_score < t.low_score {
        OverallVerdict::LikelyFalse
    } else if counts.misleading as f64 > total * t.misleading_fraction || final_score < t.high_score {
        OverallVerdict::Misleading
    } else if counts.true_ as f64 > total * t.likely_true_fraction {
        OverallVerdict::LikelyTrue
    } else {
        OverallVerdict::Unverified
    }
}

/// Negation pairs present on opposite sides of a refutation. Non-refuting
/// results yield nothing.
pub fn highlight_discrepancies(claim: &Claim, evidence: &Evidence, nli: &NliResult) -> Vec<String> {
    if nli.label != RelationshipLabel::Refutes {
        return Vec::new();
    }
    let mut found = Vec::new();
    for m in PAIR_MATCHERS.iter() {
        if m.positive_re.is_match(&claim.text) && m.negative_re.is_match(&evidence.snippet) {
            found.push(format!("Claim states '{}' but evidence shows '{}'", m.positive, m.negative));
        } else if m.negative_re.is_match(&claim.text) && m.positive_re.is_match(&evidence.snippet) {
            found.push(format!("Claim states '{}' but evidence shows '{}'", m.negative, m.positive));
        }
    }
    if found.is_empty() {
        found.push(GENERIC_DISCREPANCY.to_string());
    }
    found
}

/// One card per claim that has evidence with an NLI result, showing the
/// highest-priority relationship (REFUTES, then SUPPORTS, then NEUTRAL).
/// Ties keep evidence rank order.
pub fn create_evidence_cards(
    claims: &[Claim],
    evidence: &HashMap<Uuid, Vec<Evidence>>,
    nli: &HashMap<Uuid, Vec<NliResult>>,
) -> Vec<EvidenceCard> {
    let mut cards = Vec::with_capacity(claims.len());
    for claim in claims {
        let (Some(items), Some(results)) = (evidence.get(&claim.id), nli.get(&claim.id)) else {
            debug!(claim = %claim.id, "no evidence for card");
            continue;
        };
        let best = items
            .iter()
            .filter_map(|ev| results.iter().find(|r| r.evidence_id == ev.id).map(|r| (ev, r)))
            .min_by_key(|(_, r)| r.label.card_priority());
        let Some((ev, result)) = best else {
            warn!(claim = %claim.id, "evidence without matching NLI results");
            continue;
        };
        cards.push(EvidenceCard {
            claim: claim.text.clone(),
            evidence_snippet: ev.snippet.clone(),
            source_url: ev.source_url.clone(),
            source_name: ev.source_domain.clone(),
            relationship: result.label,
            highlighted_discrepancies: highlight_discrepancies(claim, ev, result),
        });
    }
    if !claims.is_empty() && (cards.len() as f64) < claims.len() as f64 * 0.9 {
        warn!(cards = cards.len(), claims = claims.len(), "some claims lack evidence cards");
    } else {
        info!(cards = cards.len(), claims = claims.len(), "evidence cards created");
    }
    cards
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn truncate_claim(text: &str) -> String {
    if text.chars().count() > EXPLANATION_CLAIM_CHARS {
        let head: String = text.chars().take(EXPLANATION_CLAIM_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

pub fn generate_explanation(
    claims: &[Claim],
    scores: &[VerificationScore],
    final_score: f64,
    overall: OverallVerdict,
) -> String {
    let mut out = match overall {
        OverallVerdict::LikelyTrue => format!(
            "This article appears to be largely accurate (confidence: {final_score:.0}%). \
             Most of the factual claims are supported by credible evidence."
        ),
        OverallVerdict::LikelyFalse => format!(
            "This article contains significant inaccuracies (confidence: {final_score:.0}%). \
             Many of the factual claims are contradicted by credible evidence."
        ),
        OverallVerdict::Misleading => format!(
            "This article is misleading (confidence: {final_score:.0}%). \
             It contains a mix of accurate and inaccurate information, \
             or presents facts in a way that could mislead readers."
        ),
        OverallVerdict::Unverified => format!(
            "We couldn't verify this article (confidence: {final_score:.0}%). \
             There isn't enough reliable evidence available to confirm or deny the claims."
        ),
    };

    let counts = VerdictCounts::of(scores);
    let total = scores.len();
    let be = |n: usize| if n == 1 { "is" } else { "are" };
    let _ = write!(out, "\n\nWe analyzed {total} factual claim{} from this article:", plural(total));
    if counts.true_ > 0 {
        let n = counts.true_;
        let _ = write!(out, "\n- {n} claim{} {} supported by evidence", plural(n), be(n));
    }
    if counts.false_ > 0 {
        let n = counts.false_;
        let _ = write!(out, "\n- {n} claim{} {} contradicted by evidence", plural(n), be(n));
    }
    if counts.misleading > 0 {
        let n = counts.misleading;
        let _ = write!(out, "\n- {n} claim{} {} misleading or partially true", plural(n), be(n));
    }
    if counts.unverified > 0 {
        let n = counts.unverified;
        let _ = write!(out, "\n- {n} claim{} could not be verified", plural(n));
    }

    out.push_str("\n\nClaim-by-claim analysis:");
    for (i, (claim, score)) in claims.iter().zip(scores).enumerate() {
        let text = truncate_claim(&claim.text);
        let detail = match score.verdict {
            Verdict::True => format!(
                "✓ SUPPORTED: This claim is backed by {} credible source(s). The evidence confirms this information.",
                score.support_count
            ),
            Verdict::False => format!(
                "✗ FALSE: This claim is contradicted by {} credible source(s). The evidence shows this is not accurate.",
                score.refute_count
            ),
            Verdict::Misleading => format!(
                "⚠ MISLEADING: This claim has conflicting evidence ({} supporting, {} contradicting). \
                 The truth is more nuanced than presented.",
                score.support_count, score.refute_count
            ),
            Verdict::Unverified => {
                "? UNVERIFIED: We couldn't find enough reliable evidence to verify this claim.".to_string()
            }
        };
        let _ = write!(out, "\n\n{}. \"{text}\"\n   {detail}", i + 1);
    }
    out
}

/// Final verdict for an article. `scores[i]` must belong to `claims[i]`.
pub fn generate_verdict(
    claims: &[Claim],
    scores: &[VerificationScore],
    evidence: &HashMap<Uuid, Vec<Evidence>>,
    nli: &HashMap<Uuid, Vec<NliResult>>,
    tone: &ToneScore,
    avg_credibility: f64,
    t: &Thresholds,
) -> VerifyResult<FinalVerdict> {
    if claims.len() != scores.len() {
        return Err(VerifyError::InvalidInput(format!(
            "{} claims but {} verification scores",
            claims.len(),
            scores.len()
        )));
    }
    if let Some((c, s)) = claims.iter().zip(scores).find(|(c, s)| c.id != s.claim_id) {
        return Err(VerifyError::InvalidInput(format!("score for {} paired with claim {}", s.claim_id, c.id)));
    }

    let final_score = calculate_final_score(scores, tone, avg_credibility, t)?;
    let overall = determine_overall_verdict(scores, final_score, t);
    let counts = VerdictCounts::of(scores);
    let factual_accuracy = counts.true_ as f64 / scores.len() as f64 * 100.0;
    let manipulation = tone.sensationalism_score * 100.0;
    let cards = create_evidence_cards(claims, evidence, nli);

    let breakdown = claims
        .iter()
        .zip(scores)
        .map(|(claim, score)| {
            let items = evidence.get(&claim.id).map(Vec::as_slice).unwrap_or_default();
            let results = nli.get(&claim.id).map(Vec::as_slice).unwrap_or_default();
            let label_of = |ev: &Evidence| results.iter().find(|r| r.evidence_id == ev.id).map(|r| r.label);
            ClaimVerdict {
                claim: claim.clone(),
                score: score.clone(),
                supporting_evidence: items
                    .iter()
                    .filter(|ev| label_of(ev) == Some(RelationshipLabel::Supports))
                    .cloned()
                    .collect(),
                contradicting_evidence: items
                    .iter()
                    .filter(|ev| label_of(ev) == Some(RelationshipLabel::Refutes))
                    .cloned()
                    .collect(),
            }
        })
        .collect();

    let explanation = generate_explanation(claims, scores, final_score, overall);
    let verdict = FinalVerdict::new(overall, final_score, factual_accuracy, manipulation, breakdown, cards, &explanation)?;
    info!(
        verdict = %overall,
        confidence = final_score,
        factual = factual_accuracy,
        manipulation,
        "verdict synthesized"
    );
    Ok(verdict)
}

/// Complete UNVERIFIED verdict for an article with no extractable claims.
pub fn no_claims_verdict(tone: &ToneScore) -> VerifyResult<FinalVerdict> {
    FinalVerdict::new(
        OverallVerdict::Unverified,
        0.0,
        0.0,
        tone.sensationalism_score * 100.0,
        Vec::new(),
        Vec::new(),
        NO_CLAIMS_EXPLANATION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(sensationalism: f64) -> ToneScore {
        ToneScore::new(0.0, sensationalism, vec![]).unwrap()
    }

    fn score_for(claim: &Claim, verdict: Verdict) -> VerificationScore {
        VerificationScore {
            claim_id: claim.id,
            support_count: usize::from(verdict == Verdict::True),
            refute_count: usize::from(verdict == Verdict::False),
            neutral_count: 0,
            confidence_score: 80.0,
            verdict,
        }
    }

    fn claims(n: usize) -> Vec<Claim> {
        (0..n).map(|i| Claim::new(&format!("Claim number {i} is stated"), "", 0.5).unwrap()).collect()
    }

    fn scores(claims: &[Claim], verdicts: &[Verdict]) -> Vec<VerificationScore> {
        claims.iter().zip(verdicts).map(|(c, v)| score_for(c, *v)).collect()
    }

    fn ev(snippet: &str) -> Evidence {
        Evidence::new("https://reuters.com/a", "reuters.com", snippet, None, 0.95, 0.5).unwrap()
    }

    fn nli(claim: &Claim, ev: &Evidence, label: RelationshipLabel) -> NliResult {
        let (e, c, n) = match label {
            RelationshipLabel::Supports => (0.8, 0.1, 0.1),
            RelationshipLabel::Refutes => (0.1, 0.8, 0.1),
            RelationshipLabel::Neutral => (0.1, 0.1, 0.8),
        };
        NliResult::new(claim.id, ev.id, e, c, n, label).unwrap()
    }

    #[test]
    fn all_true_with_credible_sources_scores_high() {
        let c = claims(3);
        let s = scores(&c, &[Verdict::True; 3]);
        let score = calculate_final_score(&s, &tone(0.0), 0.9, &Thresholds::default()).unwrap();
        assert!((score - 98.0).abs() < 1e-9);
        assert_eq!(determine_overall_verdict(&s, score, &Thresholds::default()), OverallVerdict::LikelyTrue);
    }

    #[test]
    fn penalties_apply() {
        let c = claims(4);
        let t = Thresholds::default();
        let s = scores(&c, &[Verdict::True, Verdict::True, Verdict::Misleading, Verdict::Unverified]);
        // 0.6*50 + 0.2*50 + 0.2*100 - 0.25*20
        let score = calculate_final_score(&s, &tone(0.0), 0.5, &t).unwrap();
        assert!((score - 55.0).abs() < 1e-9);

        let s = scores(&c, &[Verdict::False, Verdict::False, Verdict::False, Verdict::True]);
        // (0.6*25 + 0.2*50 + 0.2*100) * 0.5
        let score = calculate_final_score(&s, &tone(0.0), 0.5, &t).unwrap();
        assert!((score - 22.5).abs() < 1e-9);
    }

    #[test]
    fn final_score_rejects_bad_inputs() {
        let t = Thresholds::default();
        assert!(calculate_final_score(&[], &tone(0.0), 0.5, &t).is_err());
        let c = claims(1);
        assert!(calculate_final_score(&scores(&c, &[Verdict::True]), &tone(0.0), 1.5, &t).is_err());
    }

    #[test]
    fn verdict_tree_order() {
        let t = Thresholds::default();
        let c = claims(5);
        let mostly_false = scores(&c, &[Verdict::False, Verdict::False, Verdict::False, Verdict::True, Verdict::True]);
        assert_eq!(determine_overall_verdict(&mostly_false, 90.0, &t), OverallVerdict::LikelyFalse);

        let all_true = scores(&c, &[Verdict::True; 5]);
        assert_eq!(determine_overall_verdict(&all_true, 39.9, &t), OverallVerdict::LikelyFalse);
        assert_eq!(determine_overall_verdict(&all_true, 50.0, &t), OverallVerdict::Misleading);
        assert_eq!(determine_overall_verdict(&all_true, 65.0, &t), OverallVerdict::LikelyTrue);

        let misleading = scores(&c, &[Verdict::Misleading, Verdict::Misleading, Verdict::True, Verdict::True, Verdict::True]);
        assert_eq!(determine_overall_verdict(&misleading, 80.0, &t), OverallVerdict::Misleading);

        let unverified = scores(&c, &[Verdict::Unverified; 5]);
        assert_eq!(determine_overall_verdict(&unverified, 70.0, &t), OverallVerdict::Unverified);
    }

    #[test]
    fn discrepancies_for_refutations_only() {
        let claim = Claim::new("The bill was passed and unemployment increased", "", 0.5).unwrap();
        let refuting = ev("The bill was not passed; unemployment decreased");
        let found = highlight_discrepancies(&claim, &refuting, &nli(&claim, &refuting, RelationshipLabel::Refutes));
        assert_eq!(
            found,
            vec![
                "Claim states 'was' but evidence shows 'was not'".to_string(),
                "Claim states 'increased' but evidence shows 'decreased'".to_string(),
            ]
        );
        let supporting = nli(&claim, &refuting, RelationshipLabel::Supports);
        assert!(highlight_discrepancies(&claim, &refuting, &supporting).is_empty());
    }

    #[test]
    fn generic_discrepancy_when_no_pair_matches() {
        let claim = Claim::new("Paris hosted the 2024 Olympics", "", 0.5).unwrap();
        let e = ev("London hosted the 2012 Olympics");
        let found = highlight_discrepancies(&claim, &e, &nli(&claim, &e, RelationshipLabel::Refutes));
        assert_eq!(found, vec![GENERIC_DISCREPANCY.to_string()]);
    }

    #[test]
    fn word_boundaries_prevent_false_pairs() {
        let claim = Claim::new("This cannot happen", "", 0.5).unwrap();
        let e = ev("Scanners detected it");
        let found = highlight_discrepancies(&claim, &e, &nli(&claim, &e, RelationshipLabel::Refutes));
        assert_eq!(found, vec![GENERIC_DISCREPANCY.to_string()]);
    }

    #[test]
    fn cards_prefer_refuting_evidence() {
        let c = claims(2);
        let support = ev("Support snippet");
        let refute = ev("Refute snippet");
        let neutral = ev("Neutral snippet");
        let evidence = HashMap::from([(c[0].id, vec![neutral.clone(), support.clone(), refute.clone()])]);
        let results = HashMap::from([(
            c[0].id,
            vec![
                nli(&c[0], &neutral, RelationshipLabel::Neutral),
                nli(&c[0], &support, RelationshipLabel::Supports),
                nli(&c[0], &refute, RelationshipLabel::Refutes),
            ],
        )]);
        let cards = create_evidence_cards(&c, &evidence, &results);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].relationship, RelationshipLabel::Refutes);
        assert_eq!(cards[0].evidence_snippet, "Refute snippet");
        assert_eq!(cards[0].source_name, "reuters.com");
        assert!(!cards[0].highlighted_discrepancies.is_empty());
    }

    #[test]
    fn explanation_lists_every_claim() {
        let long = Claim::new(&"x".repeat(150), "", 0.5).unwrap();
        let short = Claim::new("Short claim here", "", 0.5).unwrap();
        let c = vec![long, short];
        let s = scores(&c, &[Verdict::True, Verdict::Unverified]);
        let text = generate_explanation(&c, &s, 72.4, OverallVerdict::LikelyTrue);
        assert!(text.starts_with("This article appears to be largely accurate (confidence: 72%)."));
        assert!(text.contains("We analyzed 2 factual claims from this article:"));
        assert!(text.contains("- 1 claim is supported by evidence"));
        assert!(text.contains("- 1 claim could not be verified"));
        assert!(text.contains(&format!("1. \"{}...\"", "x".repeat(100))));
        assert!(text.contains("2. \"Short claim here\""));
    }

    #[test]
    fn verdict_carries_breakdown_and_scores() {
        let c = claims(2);
        let e0 = ev("Supporting report");
        let e1 = ev("Refuting report");
        let evidence = HashMap::from([(c[0].id, vec![e0.clone()]), (c[1].id, vec![e1.clone()])]);
        let results = HashMap::from([
            (c[0].id, vec![nli(&c[0], &e0, RelationshipLabel::Supports)]),
            (c[1].id, vec![nli(&c[1], &e1, RelationshipLabel::Refutes)]),
        ]);
        let s = scores(&c, &[Verdict::True, Verdict::False]);
        let v = generate_verdict(&c, &s, &evidence, &results, &tone(0.25), 0.95, &Thresholds::default()).unwrap();
        assert_eq!(v.claim_breakdown.len(), 2);
        assert_eq!(v.claim_breakdown[0].supporting_evidence.len(), 1);
        assert_eq!(v.claim_breakdown[1].contradicting_evidence.len(), 1);
        assert_eq!(v.factual_accuracy_score, 50.0);
        assert_eq!(v.emotional_manipulation_score, 25.0);
        assert_eq!(v.evidence_cards.len(), 2);
        assert_eq!(v.overall_verdict, OverallVerdict::LikelyFalse);
        assert!(!v.explanation.is_empty());
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let c = claims(2);
        let t = Thresholds::default();
        let s = scores(&c[..1], &[Verdict::True]);
        let empty = HashMap::new();
        let empty_nli = HashMap::new();
        assert!(generate_verdict(&c, &s, &empty, &empty_nli, &tone(0.0), 0.5, &t).is_err());
        let swapped = vec![score_for(&c[1], Verdict::True), score_for(&c[0], Verdict::True)];
        assert!(generate_verdict(&c, &swapped, &empty, &empty_nli, &tone(0.0), 0.5, &t).is_err());
    }

    #[test]
    fn no_claims_is_a_valid_unverified_verdict() {
        let v = no_claims_verdict(&tone(0.5)).unwrap();
        assert_eq!(v.overall_verdict, OverallVerdict::Unverified);
        assert_eq!(v.confidence_score, 0.0);
        assert_eq!(v.emotional_manipulation_score, 50.0);
        assert_eq!(v.explanation, NO_CLAIMS_EXPLANATION);
    }
}
