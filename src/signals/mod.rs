//! Signal extractors.
//!
//! Each extractor turns text into one [`SignalContribution`], independently of
//! the lexicon:
//!
//! - **Polarity intensity**: `|compound| * 100`, bonus when above a threshold
//! - **Subjectivity**: opinion share as a percentage, bonus when above a threshold
//! - **Weak sourcing**: bonus when any vague-attribution phrase is present
//! - **Classifier**: label probabilities weighted per label
//!
//! Extractors never fail a scan. When a collaborator errors, the contribution
//! is neutral (zero points) and carries a `degraded` note instead.

mod cache;
mod classifier;
mod sentiment;
mod sourcing;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use cache::{CacheKey, CacheStats, CachedClassifier};
#[cfg(feature = "gemini")]
pub use classifier::GeminiClassifier;
pub use classifier::{
    build_classification_prompt, parse_label_scores, truncate_chars, ClassifierConfig,
    LabelScores, ToxicityClassifier, DEFAULT_MAX_INPUT_CHARS, TOXICITY_LABELS,
};
pub use sentiment::{polarity_intensity, subjectivity_percent, LexiconSentiment, SentimentAnalyzer};
pub use sourcing::{WeakSourcingDetector, DEFAULT_WEAK_SOURCING_PHRASES};

use crate::error::Error;

/// Which extractor produced a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    PolarityIntensity,
    Subjectivity,
    WeakSourcing,
    Classifier,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PolarityIntensity => write!(f, "polarity intensity"),
            Self::Subjectivity => write!(f, "subjectivity"),
            Self::WeakSourcing => write!(f, "weak sourcing"),
            Self::Classifier => write!(f, "classifier"),
        }
    }
}

/// One extractor's output as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub kind: SignalKind,
    /// Measured value (percent for polarity/subjectivity, phrase count, weighted label sum)
    pub value: f64,
    /// Value the measurement had to exceed
    pub threshold: f64,
    pub triggered: bool,
    /// Points added to the score
    pub points: u32,
    /// Phrases or labels that explain the value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    /// Set when the collaborator failed and the contribution is neutral
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl SignalContribution {
    /// Zero contribution after a collaborator failure.
    pub fn neutral(kind: SignalKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            value: 0.0,
            threshold: 0.0,
            triggered: false,
            points: 0,
            evidence: Vec::new(),
            degraded: Some(reason.into()),
        }
    }

    fn threshold_bonus(kind: SignalKind, value: f64, threshold: f64, bonus: u32) -> Self {
        let triggered = value > threshold;
        Self {
            kind,
            value,
            threshold,
            triggered,
            points: if triggered { bonus } else { 0 },
            evidence: Vec::new(),
            degraded: None,
        }
    }
}

/// Thresholds and fixed bonuses for document-level signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Polarity intensity (0-100) that must be exceeded
    pub polarity_intensity: f64,
    pub polarity_bonus: u32,
    /// Subjectivity fraction (0-1) that must be exceeded
    pub subjectivity: f64,
    pub subjectivity_bonus: u32,
    pub weak_sourcing_bonus: u32,
    /// Points per unit probability, per classifier label
    pub label_weights: BTreeMap<String, f64>,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            polarity_intensity: 60.0,
            polarity_bonus: 20,
            subjectivity: 0.7,
            subjectivity_bonus: 15,
            weak_sourcing_bonus: 15,
            label_weights: [
                ("identity_hate", 50.0),
                ("severe_toxic", 40.0),
                ("threat", 35.0),
                ("insult", 25.0),
                ("obscene", 20.0),
                ("toxic", 15.0),
            ]
            .into_iter()
            .map(|(label, weight)| (label.to_string(), weight))
            .collect(),
        }
    }
}

impl SignalThresholds {
    pub fn with_label_weight(mut self, label: impl Into<String>, weight: f64) -> Self {
        self.label_weights.insert(label.into(), weight);
        self
    }
}

/// Polarity-intensity contribution.
pub fn polarity_signal(
    analyzer: &dyn SentimentAnalyzer,
    text: &str,
    thresholds: &SignalThresholds,
) -> SignalContribution {
    match analyzer.polarity(text) {
        Ok(compound) => SignalContribution::threshold_bonus(
            SignalKind::PolarityIntensity,
            polarity_intensity(compound),
            thresholds.polarity_intensity,
            thresholds.polarity_bonus,
        ),
        Err(e) => {
            warn!(error = %e, "polarity unavailable, contributing zero");
            SignalContribution::neutral(SignalKind::PolarityIntensity, e.to_string())
        }
    }
}

/// Subjectivity contribution. The value is reported as a percentage.
pub fn subjectivity_signal(
    analyzer: &dyn SentimentAnalyzer,
    text: &str,
    thresholds: &SignalThresholds,
) -> SignalContribution {
    match analyzer.subjectivity(text) {
        Ok(subjectivity) => SignalContribution::threshold_bonus(
            SignalKind::Subjectivity,
            subjectivity_percent(subjectivity),
            subjectivity_percent(thresholds.subjectivity),
            thresholds.subjectivity_bonus,
        ),
        Err(e) => {
            warn!(error = %e, "subjectivity unavailable, contributing zero");
            SignalContribution::neutral(SignalKind::Subjectivity, e.to_string())
        }
    }
}

/// Weak-sourcing contribution.
pub fn weak_sourcing_signal(
    detector: &WeakSourcingDetector,
    text: &str,
    thresholds: &SignalThresholds,
) -> SignalContribution {
    let found = detector.detect(text);
    let mut contribution = SignalContribution::threshold_bonus(
        SignalKind::WeakSourcing,
        found.len() as f64,
        0.0,
        thresholds.weak_sourcing_bonus,
    );
    contribution.evidence = found.into_iter().map(str::to_string).collect();
    contribution
}

/// Weighted sum of label probabilities. Labels without a weight count zero.
pub fn weigh_labels(scores: &LabelScores, weights: &BTreeMap<String, f64>) -> f64 {
    scores
        .iter()
        .map(|(label, p)| p.clamp(0.0, 1.0) * weights.get(label).copied().unwrap_or(0.0))
        .sum()
}

/// Result of consulting the external classifier for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutcome {
    pub contribution: SignalContribution,
    /// Raw label probabilities (empty when degraded)
    pub labels: LabelScores,
    /// Characters actually sent to the classifier
    pub analyzed_chars: usize,
    /// Whether the input was cut to fit the classifier's ceiling
    pub truncated: bool,
}

/// Truncate, classify and weigh. Never fails: errors and timeouts degrade to zero.
pub async fn classifier_signal(
    classifier: &dyn ToxicityClassifier,
    text: &str,
    thresholds: &SignalThresholds,
    timeout: Option<Duration>,
) -> ClassifierOutcome {
    let (analyzed, truncated) = truncate_chars(text, classifier.max_input_chars());
    let analyzed_chars = analyzed.chars().count();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, classifier.classify(analyzed)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(limit.as_millis() as u64)),
        },
        None => classifier.classify(analyzed).await,
    };

    match result {
        Ok(labels) => {
            let value = weigh_labels(&labels, &thresholds.label_weights);
            let points = value.round().max(0.0) as u32;
            let mut evidence: Vec<(&String, &f64)> =
                labels.iter().filter(|(_, p)| **p > 0.0).collect();
            evidence.sort_by(|a, b| b.1.total_cmp(a.1).then(a.0.cmp(b.0)));
            ClassifierOutcome {
                contribution: SignalContribution {
                    kind: SignalKind::Classifier,
                    value,
                    threshold: 0.0,
                    triggered: points > 0,
                    points,
                    evidence: evidence
                        .into_iter()
                        .map(|(label, p)| format!("{}={:.2}", label, p))
                        .collect(),
                    degraded: None,
                },
                labels,
                analyzed_chars,
                truncated,
            }
        }
        Err(e) => {
            warn!(
                provider = classifier.provider(),
                error = %e,
                "classifier unavailable, contributing zero"
            );
            ClassifierOutcome {
                contribution: SignalContribution::neutral(
                    SignalKind::Classifier,
                    format!("{} classifier unavailable: {}", classifier.provider(), e),
                ),
                labels: LabelScores::new(),
                analyzed_chars,
                truncated,
            }
        }
    }
}
