//! Sentence-level scanning.
//!
//! Risk is computed per sentence so that one inflammatory sentence surfaces
//! even inside a long neutral article. The document score comes from the
//! density of flagged sentences instead of a flat sum:
//!
//! ```text
//! score = min(toxic / total * multiplier, 100)     (total >= 2)
//! score = risk of the only sentence                (total == 1)
//! score = 0                                        (total == 0)
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregate::clamp_score;
use crate::lexicon::LexiconRegistry;
use crate::matcher::SpanMatcher;
use crate::signals::{polarity_intensity, SentimentAnalyzer, WeakSourcingDetector};

/// Terminal punctuation (plus closing quotes/brackets) followed by whitespace,
/// or a blank line.
static BOUNDARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?]+["'”’)\]]*\s+|\n\s*\n"#).expect("invalid regex")
});

/// Tokens that end with a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "gen", "gov", "sen", "rep", "inc",
    "ltd", "fig", "approx", "e.g", "i.e", "u.s", "u.k", "u.n", "a.m", "p.m",
];

/// Splits text into ordered sentences.
pub trait SentenceSplitter: Send + Sync {
    /// Deterministic: the same input always yields the same sentences.
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

/// Punctuation-based splitter that skips common abbreviations and initials.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSplitter;

impl PunctuationSplitter {
    pub fn new() -> Self {
        Self
    }

    fn is_abbreviation(preceding: &str, boundary: &str) -> bool {
        if !boundary.starts_with('.') || boundary.starts_with("..") {
            return false;
        }
        let token = preceding
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| !c.is_alphanumeric());

        // "J. R. Smith", but not "So am I."
        let mut chars = token.chars();
        let initial = matches!(
            (chars.next(), chars.next()),
            (Some(c), None) if c.is_uppercase() && c != 'I'
        );
        initial || ABBREVIATIONS.contains(&token.to_lowercase().as_str())
    }
}

impl SentenceSplitter for PunctuationSplitter {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in BOUNDARY_PATTERN.find_iter(text) {
            if Self::is_abbreviation(&text[start..boundary.start()], boundary.as_str()) {
                continue;
            }
            let sentence = text[start..boundary.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = boundary.end();
        }

        let rest = text[start..].trim();
        if !rest.is_empty() {
            sentences.push(rest);
        }
        sentences
    }
}

/// Points and thresholds for per-sentence risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRiskWeights {
    /// Added when polarity intensity exceeds `polarity_threshold`
    pub polarity: u32,
    /// Added when subjectivity exceeds `subjectivity_threshold`
    pub subjectivity: u32,
    /// Added per category with at least one hit in the sentence
    pub per_category: u32,
    /// Added when any weak-sourcing phrase is present
    pub weak_sourcing: u32,
    /// Polarity intensity in percent
    pub polarity_threshold: f64,
    /// Subjectivity fraction in [0, 1]
    pub subjectivity_threshold: f64,
}

impl Default for SentenceRiskWeights {
    fn default() -> Self {
        Self {
            polarity: 30,
            subjectivity: 25,
            per_category: 20,
            weak_sourcing: 25,
            polarity_threshold: 60.0,
            subjectivity_threshold: 0.7,
        }
    }
}

/// One flagged sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    /// 1-based position in scan order
    pub index: usize,
    pub text: String,
    pub risk: u8,
    /// Why the sentence scored, in evaluation order
    pub flags: Vec<String>,
}

/// Result of a sentence-level scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceScan {
    pub total_sentences: usize,
    /// Sentences above the risk threshold, highest risk first
    pub records: Vec<SentenceRecord>,
    pub score: u8,
    /// Collaborator failures absorbed during the scan
    pub degraded: Vec<String>,
}

impl SentenceScan {
    pub fn toxic_sentences(&self) -> usize {
        self.records.len()
    }
}

/// Density formula. Zero sentences score zero.
pub fn density_score(toxic: usize, total: usize, multiplier: f64) -> u8 {
    if total == 0 {
        return 0;
    }
    let raw = toxic as f64 * multiplier / total as f64;
    clamp_score(raw.max(0.0).floor() as u64)
}

/// Scores text sentence by sentence.
pub struct SentenceScanner<'a> {
    matcher: SpanMatcher<'a>,
    sentiment: &'a dyn SentimentAnalyzer,
    splitter: &'a dyn SentenceSplitter,
    sourcing: &'a WeakSourcingDetector,
    weights: SentenceRiskWeights,
    risk_threshold: u8,
    density_multiplier: f64,
}

impl<'a> SentenceScanner<'a> {
    pub const DEFAULT_RISK_THRESHOLD: u8 = 40;
    pub const DEFAULT_DENSITY_MULTIPLIER: f64 = 250.0;

    pub fn new(
        registry: &'a LexiconRegistry,
        sentiment: &'a dyn SentimentAnalyzer,
        splitter: &'a dyn SentenceSplitter,
        sourcing: &'a WeakSourcingDetector,
    ) -> Self {
        Self {
            matcher: SpanMatcher::new(registry),
            sentiment,
            splitter,
            sourcing,
            weights: SentenceRiskWeights::default(),
            risk_threshold: Self::DEFAULT_RISK_THRESHOLD,
            density_multiplier: Self::DEFAULT_DENSITY_MULTIPLIER,
        }
    }

    pub fn with_weights(mut self, weights: SentenceRiskWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_risk_threshold(mut self, threshold: u8) -> Self {
        self.risk_threshold = threshold;
        self
    }

    pub fn with_density_multiplier(mut self, multiplier: f64) -> Self {
        self.density_multiplier = multiplier;
        self
    }

    pub fn scan(&self, text: &str) -> SentenceScan {
        let sentences = self.splitter.split(text);
        let total_sentences = sentences.len();
        let mut degraded = Vec::new();

        let mut scored: Vec<SentenceRecord> = sentences
            .iter()
            .enumerate()
            .map(|(i, sentence)| self.score_sentence(i + 1, sentence, &mut degraded))
            .collect();

        let score = match total_sentences {
            0 => 0,
            1 => scored[0].risk,
            _ => {
                let toxic = scored.iter().filter(|r| r.risk > self.risk_threshold).count();
                density_score(toxic, total_sentences, self.density_multiplier)
            }
        };

        scored.retain(|r| r.risk > self.risk_threshold);
        scored.sort_by(|a, b| b.risk.cmp(&a.risk));

        debug!(
            total = total_sentences,
            toxic = scored.len(),
            score,
            "sentence scan complete"
        );

        SentenceScan {
            total_sentences,
            records: scored,
            score,
            degraded,
        }
    }

    fn score_sentence(
        &self,
        index: usize,
        sentence: &str,
        degraded: &mut Vec<String>,
    ) -> SentenceRecord {
        let weights = &self.weights;
        let mut risk: u64 = 0;
        let mut flags = Vec::new();

        match self.sentiment.polarity(sentence) {
            Ok(compound) => {
                let intensity = polarity_intensity(compound);
                if intensity > weights.polarity_threshold {
                    risk += weights.polarity as u64;
                    flags.push(format!("High emotional intensity ({:.0}%)", intensity));
                }
            }
            Err(e) => note_degraded(degraded, format!("polarity unavailable: {}", e)),
        }

        match self.sentiment.subjectivity(sentence) {
            Ok(subjectivity) => {
                if subjectivity > weights.subjectivity_threshold {
                    risk += weights.subjectivity as u64;
                    flags.push(format!("Highly subjective ({:.0}%)", subjectivity * 100.0));
                }
            }
            Err(e) => note_degraded(degraded, format!("subjectivity unavailable: {}", e)),
        }

        let resolved = self.matcher.scan(sentence);
        for count in resolved.breakdown.categories.iter().filter(|c| c.hits > 0) {
            risk += weights.per_category as u64;
            let example = resolved
                .matches
                .iter()
                .find(|m| m.category == count.name)
                .map(|m| m.text.as_str())
                .unwrap_or_default();
            flags.push(format!("{}: \"{}\"", count.label, example));
        }

        let phrases = self.sourcing.detect(sentence);
        if !phrases.is_empty() {
            risk += weights.weak_sourcing as u64;
            flags.push(format!("Weak sourcing: \"{}\"", phrases.join("\", \"")));
        }

        SentenceRecord {
            index,
            text: sentence.to_string(),
            risk: clamp_score(risk),
            flags,
        }
    }
}

fn note_degraded(degraded: &mut Vec<String>, note: String) {
    if !degraded.contains(&note) {
        warn!(reason = %note, "sentence signal unavailable, contributing zero");
        degraded.push(note);
    }
}
