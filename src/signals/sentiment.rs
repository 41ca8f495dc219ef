//! Polarity and subjectivity.
//!
//! [`SentimentAnalyzer`] is the seam for a real NLP library. The built-in
//! [`LexiconSentiment`] is a small deterministic valence model: word valences
//! in [-4, 4], negation flips, intensifier boosts, shouting and exclamation
//! emphasis, normalised into [-1, 1] with `x / sqrt(x^2 + 15)`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// Source of compound polarity and subjectivity scores.
pub trait SentimentAnalyzer: Send + Sync {
    /// Compound polarity in [-1, 1].
    fn polarity(&self, text: &str) -> Result<f64>;

    /// Share of opinion versus fact, in [0, 1].
    fn subjectivity(&self, text: &str) -> Result<f64>;
}

/// Polarity magnitude on a 0-100 scale.
pub fn polarity_intensity(compound: f64) -> f64 {
    compound.abs().min(1.0) * 100.0
}

/// Subjectivity as a percentage.
pub fn subjectivity_percent(subjectivity: f64) -> f64 {
    subjectivity.clamp(0.0, 1.0) * 100.0
}

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCREMENT: f64 = 0.293;
const CAPS_INCREMENT: f64 = 0.733;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;
const NEGATION_WINDOW: usize = 3;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'\-]*").expect("invalid regex"));

static VALENCE: LazyLock<HashMap<&'static str, f64>> = LazyLock::new(|| {
    [
        // strongly negative
        ("hate", -2.7), ("hateful", -3.0), ("evil", -3.4), ("disgusting", -3.0),
        ("horrible", -2.5), ("horrifying", -2.7), ("terrible", -2.5), ("terrifying", -2.7),
        ("catastrophe", -3.4), ("catastrophic", -3.4), ("disaster", -3.1), ("deadly", -2.6),
        ("kill", -3.7), ("killed", -3.5), ("murder", -3.7), ("destroy", -2.9),
        ("destroyed", -2.9), ("vile", -3.1), ("vermin", -2.8), ("filth", -2.8),
        ("traitor", -2.9), ("betrayal", -2.8), ("betrayed", -2.8), ("corrupt", -2.6),
        ("nightmare", -2.6), ("outrage", -2.3), ("outrageous", -2.2), ("furious", -2.7),
        ("shameful", -2.4), ("disgrace", -2.5), ("idiot", -2.3), ("moron", -2.3),
        ("liar", -2.6), ("panic", -2.1), ("threat", -2.4), ("enemy", -2.5),
        ("attack", -2.1), ("war", -2.9), ("crisis", -2.1), ("collapse", -2.2),
        // mildly negative
        ("bad", -2.5), ("wrong", -2.1), ("fear", -2.2), ("afraid", -2.2),
        ("scared", -2.2), ("angry", -2.3), ("sad", -2.1), ("worse", -2.1),
        ("worst", -3.1), ("problem", -1.7), ("risk", -1.1), ("fail", -2.3),
        ("failed", -2.3), ("lose", -1.6), ("weak", -1.9), ("suffering", -2.1),
        ("helpless", -2.0), ("alarming", -1.9), ("shocking", -1.7), ("dangerous", -2.1),
        // positive
        ("good", 1.9), ("great", 3.1), ("excellent", 2.7), ("amazing", 2.8),
        ("wonderful", 2.7), ("love", 3.2), ("best", 3.2), ("happy", 2.7),
        ("hope", 1.9), ("safe", 1.9), ("success", 2.7), ("win", 2.8),
        ("brave", 2.4), ("hero", 2.6), ("heroes", 2.4), ("peaceful", 2.2),
        ("support", 1.7), ("thank", 1.5), ("justice", 2.0), ("trust", 2.3),
        ("beautiful", 2.9), ("incredible", 2.2), ("miracle", 2.8), ("unbelievable", 0.8),
        ("fair", 1.3), ("honest", 2.3), ("calm", 1.3), ("glad", 2.0),
    ]
    .into_iter()
    .collect()
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "without",
    "hardly",
];

const BOOSTERS: &[&str] = &[
    "very", "extremely", "totally", "absolutely", "so", "really", "incredibly", "utterly",
    "completely", "deeply", "truly", "most",
];

/// Opinion markers that carry no valence of their own.
const OPINION_MARKERS: &[&str] = &[
    "think", "believe", "feel", "obviously", "clearly", "surely", "must", "should",
    "seems", "probably", "apparently", "undoubtedly", "frankly", "honestly", "opinion",
    "always", "everyone", "nobody", "everything", "totally", "absolutely",
];

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

fn is_shouting(token: &str) -> bool {
    token.len() > 1
        && token.chars().all(|c| !c.is_lowercase())
        && token.chars().any(char::is_uppercase)
}

/// Deterministic valence-lexicon sentiment model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    fn raw_valence(&self, text: &str) -> f64 {
        let originals: Vec<&str> = TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()).collect();
        let tokens: Vec<String> = originals.iter().map(|t| t.to_lowercase()).collect();
        let mixed_case = originals.iter().any(|t| !is_shouting(t));

        let mut sum = 0.0;
        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = VALENCE.get(token.as_str()) else {
                continue;
            };
            let sign = base.signum();
            let mut valence = base;

            if mixed_case && is_shouting(originals[i]) {
                valence += sign * CAPS_INCREMENT;
            }
            if i > 0 && BOOSTERS.contains(&tokens[i - 1].as_str()) {
                valence += sign * BOOSTER_INCREMENT;
            }
            let window = i.saturating_sub(NEGATION_WINDOW)..i;
            if tokens[window].iter().any(|t| is_negation(t)) {
                valence *= NEGATION_SCALAR;
            }
            sum += valence;
        }

        if sum != 0.0 {
            let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64;
            sum += sum.signum() * exclamations * EXCLAMATION_INCREMENT;
        }
        sum
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn polarity(&self, text: &str) -> Result<f64> {
        let sum = self.raw_valence(text);
        let compound = sum / (sum * sum + NORMALIZATION_ALPHA).sqrt();
        Ok(compound.clamp(-1.0, 1.0))
    }

    /// Average subjectivity of opinion-bearing words; 0 when none occur.
    fn subjectivity(&self, text: &str) -> Result<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for token in TOKEN_PATTERN.find_iter(text) {
            let token = token.as_str().to_lowercase();
            let weight = match VALENCE.get(token.as_str()) {
                Some(v) if v.abs() >= 2.5 => 1.0,
                Some(_) => 0.75,
                None if OPINION_MARKERS.contains(&token.as_str()) => 0.9,
                None => continue,
            };
            total += weight;
            count += 1;
        }
        if count == 0 {
            return Ok(0.0);
        }
        Ok((total / count as f64).clamp(0.0, 1.0))
    }
}
