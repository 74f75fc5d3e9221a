//! Static source credibility table.
//!
//! Loaded once, then only read. Share it behind an `Arc`; lookups take `&self`
//! and never lock.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use crate::error::ConfigError;
use crate::types::{SourceCategory, SourceCredibility};

const BUILTIN_DATASET: &str = include_str!("../data/source_credibility.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub credibility_score: f64,
    #[serde(default)]
    pub category: Option<SourceCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(default = "default_score")]
    default_credibility_score: f64,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    sources: HashMap<String, SourceEntry>,
}

fn default_score() -> f64 {
    0.5
}

#[derive(Debug, Clone)]
pub struct CredibilityTable {
    sources: HashMap<String, SourceEntry>,
    default_score: f64,
    last_updated: Option<DateTime<Utc>>,
}

impl CredibilityTable {
    /// The dataset compiled into the crate.
    pub fn builtin() -> Self {
        // The embedded file is checked by `builtin_dataset_is_valid`.
        Self::from_json_or_empty(BUILTIN_DATASET)
    }

    fn from_json_or_empty(raw: &str) -> Self {
        Self::from_json_str(raw).unwrap_or_else(|e| {
            error!(error = %e, "built-in credibility dataset is invalid, using default scores only");
            Self::empty()
        })
    }

    pub fn empty() -> Self {
        Self { sources: HashMap::new(), default_score: default_score(), last_updated: None }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let table = Self::from_json_str(&raw)?;
        info!(path = %path.display(), sources = table.len(), "loaded credibility dataset");
        Ok(table)
    }

    /// Parse and validate a dataset. Keys are normalized; an entry whose
    /// category disagrees with its score bucket is rejected.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let data: Dataset = serde_json::from_str(raw).map_err(|e| ConfigError::Invalid {
            key: "source_credibility",
            reason: e.to_string(),
        })?;
        if !(0.0..=1.0).contains(&data.default_credibility_score) {
            return Err(ConfigError::Invalid {
                key: "defaultCredibilityScore",
                reason: format!("{} outside [0, 1]", data.default_credibility_score),
            });
        }

        let mut sources = HashMap::with_capacity(data.sources.len());
        for (domain, mut entry) in data.sources {
            if !(0.0..=1.0).contains(&entry.credibility_score) {
                return Err(ConfigError::Invalid {
                    key: "credibilityScore",
                    reason: format!("{domain}: {} outside [0, 1]", entry.credibility_score),
                });
            }
            let expected = SourceCategory::for_score(entry.credibility_score);
            match entry.category {
                Some(c) if c != expected => {
                    return Err(ConfigError::Invalid {
                        key: "category",
                        reason: format!(
                            "{domain}: {c:?} does not match score {} (expected {expected:?})",
                            entry.credibility_score
                        ),
                    })
                }
                _ => entry.category = Some(expected),
            }
            sources.insert(normalize_domain(&domain), entry);
        }

        Ok(Self {
            sources,
            default_score: data.default_credibility_score,
            last_updated: data.last_updated,
        })
    }

    /// Look up a domain or URL. Unknown domains get the default score.
    pub fn lookup_source_credibility(&self, domain: &str) -> SourceCredibility {
        let normalized = normalize_domain(domain);
        let score = match self.sources.get(&normalized) {
            Some(entry) => entry.credibility_score,
            None => {
                debug!(domain = %normalized, default = self.default_score, "domain not in dataset");
                self.default_score
            }
        };
        SourceCredibility {
            domain: normalized,
            credibility_score: score,
            category: SourceCategory::for_score(score),
            last_updated: self.last_updated,
        }
    }

    pub fn default_score(&self) -> f64 {
        self.default_score
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn all_sources(&self) -> &HashMap<String, SourceEntry> {
        &self.sources
    }

    pub fn sources_by_category(&self, category: SourceCategory) -> Vec<(&str, f64)> {
        let mut out: Vec<(&str, f64)> = self
            .sources
            .iter()
            .filter(|(_, e)| e.category == Some(category))
            .map(|(d, e)| (d.as_str(), e.credibility_score))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for CredibilityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

static DEFAULT_TABLE: LazyLock<CredibilityTable> = LazyLock::new(CredibilityTable::builtin);

/// Lookup against the built-in dataset.
pub fn lookup_source_credibility(domain: &str) -> SourceCredibility {
    DEFAULT_TABLE.lookup_source_credibility(domain)
}

/// Host of a URL or bare domain, lowercased, without `www.`, port or path.
pub fn normalize_domain(url_or_domain: &str) -> String {
    let raw = url_or_domain.trim();
    let host = if raw.contains("://") {
        Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    } else {
        let head = raw.split(['/', '?', '#']).next().unwrap_or_default();
        head.split(':').next().unwrap_or_default().to_string()
    };
    let host = host.to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "defaultCredibilityScore": 0.5,
        "lastUpdated": "2024-01-15T00:00:00Z",
        "sources": {
            "apnews.com": { "credibilityScore": 0.95, "category": "TRUSTED" },
            "reuters.com": { "credibilityScore": 0.95, "category": "TRUSTED" },
            "cnn.com": { "credibilityScore": 0.7, "category": "MAINSTREAM" },
            "foxnews.com": { "credibilityScore": 0.6, "category": "MAINSTREAM" },
            "example-questionable.com": { "credibilityScore": 0.4, "category": "QUESTIONABLE" },
            "infowars.com": { "credibilityScore": 0.1, "category": "UNRELIABLE" }
        }
    }"#;

    fn sample() -> CredibilityTable {
        CredibilityTable::from_json_str(SAMPLE).unwrap()
    }

    #[test]
    fn builtin_dataset_is_valid() {
        let table = CredibilityTable::from_json_str(BUILTIN_DATASET).unwrap();
        assert!(table.len() > 20);
        assert_eq!(table.default_score(), 0.5);
    }

    #[test]
    fn unreadable_dataset_degrades_to_defaults() {
        let table = CredibilityTable::from_json_or_empty(r#"{ "sources": { "x.com": { "credibilityScore": 7 } } }"#);
        assert!(table.is_empty());
        assert_eq!(table.lookup_source_credibility("x.com").credibility_score, 0.5);
    }

    #[test]
    fn looks_up_each_category() {
        let t = sample();
        assert_eq!(t.lookup_source_credibility("apnews.com").category, SourceCategory::Trusted);
        assert_eq!(t.lookup_source_credibility("cnn.com").category, SourceCategory::Mainstream);
        assert_eq!(
            t.lookup_source_credibility("example-questionable.com").category,
            SourceCategory::Questionable
        );
        let bad = t.lookup_source_credibility("infowars.com");
        assert_eq!(bad.category, SourceCategory::Unreliable);
        assert_eq!(bad.credibility_score, 0.1);
    }

    #[test]
    fn unknown_domain_gets_default() {
        let r = sample().lookup_source_credibility("unknown-news-site.com");
        assert_eq!(r.domain, "unknown-news-site.com");
        assert_eq!(r.credibility_score, 0.5);
        assert_eq!(r.category, SourceCategory::Mainstream);
    }

    #[test]
    fn normalizes_urls_and_www() {
        let t = sample();
        assert_eq!(t.lookup_source_credibility("https://apnews.com/article/12345").domain, "apnews.com");
        assert_eq!(t.lookup_source_credibility("www.reuters.com").credibility_score, 0.95);
        assert_eq!(t.lookup_source_credibility("WWW.CNN.COM").domain, "cnn.com");
        assert_eq!(normalize_domain("cnn.com:443/world"), "cnn.com");
    }

    #[test]
    fn lookup_is_idempotent() {
        let t = sample();
        assert_eq!(t.lookup_source_credibility("cnn.com"), t.lookup_source_credibility("cnn.com"));
        assert_eq!(lookup_source_credibility("reuters.com"), lookup_source_credibility("reuters.com"));
    }

    #[test]
    fn groups_by_category() {
        let t = sample();
        assert_eq!(t.sources_by_category(SourceCategory::Trusted).len(), 2);
        assert_eq!(t.sources_by_category(SourceCategory::Mainstream).len(), 2);
        assert_eq!(t.sources_by_category(SourceCategory::Questionable).len(), 1);
        assert_eq!(t.sources_by_category(SourceCategory::Unreliable), vec![("infowars.com", 0.1)]);
        assert!(t.all_sources().contains_key("apnews.com"));
    }

    #[test]
    fn rejects_category_that_contradicts_score() {
        let raw = r#"{ "sources": { "x.com": { "credibilityScore": 0.9, "category": "MAINSTREAM" } } }"#;
        assert!(CredibilityTable::from_json_str(raw).is_err());
    }

    #[test]
    fn missing_category_is_derived_from_score() {
        let raw = r#"{ "sources": { "X.com": { "credibilityScore": 0.35 } } }"#;
        let t = CredibilityTable::from_json_str(raw).unwrap();
        assert_eq!(t.lookup_source_credibility("x.com").category, SourceCategory::Questionable);
        assert!(t.last_updated().is_none());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cred.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let t = CredibilityTable::from_path(&path).unwrap();
        assert_eq!(t.len(), 6);
        assert!(CredibilityTable::from_path(&dir.path().join("missing.json")).is_err());
    }
}
