//! Emotional-language and sensationalism scoring.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{VerifyError, VerifyResult};
use crate::segments::plain_words;
use crate::types::ToneScore;

const URGENCY: &[&str] = &[
    "act now", "limited time", "hurry", "don't miss out", "last chance", "urgent", "immediately",
    "right now", "before it's too late",
];
const FEAR: &[&str] = &[
    "shocking", "terrifying", "horrifying", "devastating", "catastrophic", "alarming",
    "frightening", "scary", "dangerous", "threat",
];
const CLICKBAIT: &[&str] = &[
    "you won't believe", "what happens next", "will shock you", "this one trick", "doctors hate",
    "they don't want you to know", "the truth about", "secret", "revealed", "exposed",
];
const ABSOLUTE: &[&str] = &[
    "everyone knows", "nobody can deny", "always", "never", "all experts agree", "undeniable",
    "proven fact", "absolutely",
];
const EMOTIONAL_APPEAL: &[&str] = &[
    "heartbreaking", "outrageous", "unbelievable", "incredible", "amazing", "stunning",
    "mind-blowing",
];

const EMOTIONAL_WORDS: &[&str] = &[
    "love", "hate", "fear", "angry", "furious", "enraged", "terrified", "horrified", "shocked",
    "outraged", "disgusted", "thrilled", "ecstatic", "happy", "sad", "worried", "concerned",
    "excited", "disappointed", "frustrated", "annoyed", "pleased", "upset", "anxious", "nervous",
    "very", "extremely", "incredibly", "absolutely", "totally", "completely",
];

const SENSATIONALIST_WORDS: &[&str] = &[
    "shocking", "unbelievable", "incredible", "amazing", "stunning", "mind-blowing", "explosive",
    "bombshell", "devastating", "best", "worst", "greatest", "most", "least", "biggest",
    "smallest", "crisis", "disaster", "catastrophe", "emergency", "chaos", "panic",
];

/// Case-insensitive matchers, in category order.
static PHRASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [URGENCY, FEAR, CLICKBAIT, ABSOLUTE, EMOTIONAL_APPEAL]
        .iter()
        .flat_map(|list| list.iter())
        .filter_map(|p| Regex::new(&format!("(?i){}", regex::escape(p))).ok())
        .collect()
});

/// Manipulative phrases as they appear in `text`, first casing kept,
/// deduplicated case-insensitively.
pub fn detect_manipulative_phrases(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for pattern in PHRASE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            if seen.insert(m.as_str().to_lowercase()) {
                found.push(m.as_str().to_string());
            }
        }
    }
    debug!(phrases = found.len(), "manipulative phrases detected");
    found
}

pub fn analyze_tone(text: &str) -> VerifyResult<ToneScore> {
    if text.trim().is_empty() {
        return Err(VerifyError::InvalidInput("text cannot be empty".into()));
    }
    let words = plain_words(text);
    if words.is_empty() {
        return ToneScore::new(0.0, 0.0, Vec::new());
    }
    let total = words.len() as f64;
    let count_in = |list: &[&str]| words.iter().filter(|w| list.contains(&w.as_str())).count() as f64;

    let emotional_intensity = (count_in(EMOTIONAL_WORDS) / total * 5.0).min(1.0);
    let phrases = detect_manipulative_phrases(text);
    let phrase_factor = (phrases.len() as f64 / 10.0).min(1.0);
    let word_factor = (count_in(SENSATIONALIST_WORDS) / total * 10.0).min(1.0);
    let sensationalism = (0.6 * phrase_factor + 0.4 * word_factor).min(1.0);

    let tone = ToneScore::new(emotional_intensity, sensationalism, phrases)?;
    info!(
        emotional = tone.emotional_intensity,
        sensationalism = tone.sensationalism_score,
        objectivity = tone.objectivity_score,
        phrases = tone.manipulative_phrases.len(),
        "tone analyzed"
    );
    Ok(tone)
}
