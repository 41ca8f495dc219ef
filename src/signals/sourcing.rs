//! Weak-sourcing phrase detection.

use serde::{Deserialize, Serialize};

/// Phrases that attribute claims to vague or anonymous sources.
pub const DEFAULT_WEAK_SOURCING_PHRASES: &[&str] = &[
    "sources tell us",
    "sources say",
    "unnamed sources",
    "allegedly",
    "reportedly",
    "rumor has it",
    "rumour has it",
    "some people say",
    "many people are saying",
    "people are saying",
    "it is believed",
    "insiders claim",
    "according to some",
    "it has been suggested",
    "word is",
];

/// Case-insensitive substring containment check against a phrase list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakSourcingDetector {
    phrases: Vec<String>,
}

impl Default for WeakSourcingDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WEAK_SOURCING_PHRASES.iter().copied())
    }
}

impl WeakSourcingDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Phrases present in the text, in list order.
    pub fn detect(&self, text: &str) -> Vec<&str> {
        let lower = text.to_lowercase();
        self.phrases
            .iter()
            .filter(|p| lower.contains(p.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn is_present(&self, text: &str) -> bool {
        !self.detect(text).is_empty()
    }
}
