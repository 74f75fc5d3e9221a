use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
    "those", "it", "its", "they", "them", "their",
];

/// Split on runs of `.`, `!`, `?`, dropping fragments of `min_len` chars or fewer.
pub fn split_sentences(text: &str, min_len: usize) -> Vec<String> {
    SENTENCE_END
        .split(text)
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().count() > min_len)
        .collect()
}

pub struct ContextWindow { pub left: usize, pub right: usize }

/// Sentence `i` with up to `left` sentences before and `right` after, space-joined.
pub fn context_window(sentences: &[String], i: usize, cfg: &ContextWindow) -> String {
    let left = i.saturating_sub(cfg.left);
    let right = (i + cfg.right + 1).min(sentences.len());
    sentences[left..right].join(" ")
}

/// Lowercased word tokens with stop words removed.
pub fn content_tokens(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Whitespace words, lowercased, with surrounding punctuation trimmed.
pub fn plain_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
