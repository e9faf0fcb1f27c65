//! Research intent detection
//!
//! A heuristic gate: text is a research request when it mentions one of the
//! configured keywords and is longer than a minimum length. False negatives
//! fall through to ordinary chat; false positives start a research session.

use crate::config::IntentConfig;

/// What the user's text asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Research,
    Ordinary,
}

/// Pluggable intent predicate
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Intent;
}

/// Keyword + length classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    min_length: usize,
}

impl KeywordClassifier {
    pub fn new(keywords: impl IntoIterator<Item = impl AsRef<str>>, min_length: usize) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            min_length,
        }
    }

    pub fn from_config(config: &IntentConfig) -> Self {
        Self::new(&config.keywords, config.min_length)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::from_config(&IntentConfig::default())
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();
        let has_keyword = self.keywords.iter().any(|k| lower.contains(k.as_str()));
        // Characters, not bytes: CJK text is three bytes per character
        if has_keyword && text.chars().count() > self.min_length {
            Intent::Research
        } else {
            Intent::Ordinary
        }
    }
}

/// Split a research request into topic and requirements.
///
/// Text before the first `,` or `，` is the topic; the remaining non-empty
/// parts, trimmed and re-joined with `", "`, are the requirements. Missing
/// requirements fall back to `default_requirements`.
pub fn split_topic(text: &str, default_requirements: &str) -> (String, String) {
    let text = text.trim();
    let mut parts = text.split([',', '，']);
    let topic = parts.next().unwrap_or_default().trim();
    let rest = parts
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let topic = if topic.is_empty() { text } else { topic };
    let requirements = if rest.is_empty() {
        default_requirements
    } else {
        rest.as_str()
    };
    (topic.to_string(), requirements.to_string())
}
