//! Best-effort language detection. Only used to annotate the extraction prompt.

pub const DEFAULT_LANGUAGE: &str = "en";

pub trait LanguageDetector: Send + Sync {
    /// ISO 639-1 code, or `None` when undecided.
    fn detect(&self, text: &str) -> Option<String>;
}

/// Never fails: any detector miss becomes `"en"`.
pub fn detect_or_default(detector: &dyn LanguageDetector, text: &str) -> String {
    detector.detect(text).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Picks the dominant non-Latin script, if any. Latin-script text is reported
/// as English since scripts alone cannot tell Latin languages apart.
pub struct ScriptDetector;

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let mut counts: [(&str, usize); 9] = [
            ("hi", 0), ("bn", 0), ("ta", 0), ("te", 0), ("ar", 0),
            ("ru", 0), ("zh", 0), ("ja", 0), ("en", 0),
        ];
        let mut letters = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            let slot = match c as u32 {
                0x0900..=0x097F => 0,
                0x0980..=0x09FF => 1,
                0x0B80..=0x0BFF => 2,
                0x0C00..=0x0C7F => 3,
                0x0600..=0x06FF => 4,
                0x0400..=0x04FF => 5,
                0x4E00..=0x9FFF => 6,
                0x3040..=0x30FF => 7,
                _ if c.is_ascii_alphabetic() => 8,
                _ => continue,
            };
            counts[slot].1 += 1;
        }
        if letters == 0 {
            return None;
        }
        // Kana anywhere means Japanese even when kanji dominate.
        if counts[7].1 > 0 {
            return Some("ja".to_string());
        }
        counts
            .iter()
            .max_by_key(|(_, n)| *n)
            .filter(|(_, n)| *n * 2 >= letters)
            .map(|(code, _)| code.to_string())
    }
}
