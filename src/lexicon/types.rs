//! Lexicon document and compiled category types.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single matching pattern as written in a lexicon document.
///
/// Every kind matches case-insensitively. The span of a match is always the
/// whole matched text, even when a regex contains capture groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSpec {
    /// Plain substring, matched anywhere.
    Literal(String),
    /// Literal bounded by word boundaries where it starts/ends with a word character.
    Word(String),
    /// Regular expression in `regex` crate syntax.
    Regex(String),
}

impl PatternSpec {
    /// The pattern text as written.
    pub fn source(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Word(s) | Self::Regex(s) => s,
        }
    }

    /// Translate into a regex source string.
    pub(crate) fn to_regex_source(&self) -> String {
        match self {
            Self::Literal(s) => regex::escape(s),
            Self::Word(s) => {
                let mut source = String::new();
                if s.chars().next().is_some_and(is_word_char) {
                    source.push_str(r"\b");
                }
                source.push_str(&regex::escape(s));
                if s.chars().last().is_some_and(is_word_char) {
                    source.push_str(r"\b");
                }
                source
            }
            Self::Regex(s) => s.clone(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A category as written in a lexicon document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Stable identifier, unique within a lexicon
    pub name: String,
    /// Display label
    pub label: String,
    /// Breakdown group (emotion, pressure, fallacy, hate, ...)
    pub group: String,
    /// Points per resolved hit
    pub weight: u32,
    /// Display color used by the evidence renderer
    pub color: String,
    /// Resistance tip shown when this category dominates a report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<String>,
    /// Ordered patterns; earlier patterns win equal-span ties
    pub patterns: Vec<PatternSpec>,
}

/// A versioned lexicon document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconDocument {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub description: String,
    pub categories: Vec<CategoryConfig>,
}

/// A pattern compiled for scanning.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub spec: PatternSpec,
    pub regex: Regex,
}

/// A category with compiled patterns. Immutable once the registry is built.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub label: String,
    pub group: String,
    pub weight: u32,
    pub color: String,
    pub defense: Option<String>,
    pub patterns: Vec<CompiledPattern>,
}

/// Built-in taxonomy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taxonomy {
    /// Emotional triggers and urgency cues of viral content
    ViralTriggers,
    /// Emotion/pressure/fallacy/dehumanization taxonomy
    PersuasionPressure,
    /// Hate-speech taxonomy
    HateSpeech,
}

impl Taxonomy {
    /// All built-in taxonomies.
    pub const ALL: [Taxonomy; 3] = [
        Taxonomy::ViralTriggers,
        Taxonomy::PersuasionPressure,
        Taxonomy::HateSpeech,
    ];

    /// Embedded lexicon document for this taxonomy.
    pub fn document_source(self) -> &'static str {
        match self {
            Self::ViralTriggers => include_str!("presets/viral_triggers.json"),
            Self::PersuasionPressure => include_str!("presets/persuasion_pressure.json"),
            Self::HateSpeech => include_str!("presets/hate_speech.json"),
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ViralTriggers => write!(f, "viral-triggers"),
            Self::PersuasionPressure => write!(f, "persuasion-pressure"),
            Self::HateSpeech => write!(f, "hate-speech"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_pattern_boundaries() {
        assert_eq!(PatternSpec::Word("act now".into()).to_regex_source(), r"\bact now\b");
        assert_eq!(PatternSpec::Word("(sic)".into()).to_regex_source(), r"\(sic\)");
        assert_eq!(PatternSpec::Literal("a.b".into()).to_regex_source(), r"a\.b");
        assert_eq!(PatternSpec::Regex(r"\bx+".into()).to_regex_source(), r"\bx+");
    }

    #[test]
    fn test_pattern_spec_json_shape() {
        let spec: PatternSpec = serde_json::from_str(r#"{"word":"panic"}"#).unwrap();
        assert_eq!(spec, PatternSpec::Word("panic".into()));
        assert_eq!(spec.source(), "panic");
    }
}
