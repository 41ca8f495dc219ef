//! Score aggregation and verdicts.
//!
//! `score = Σ hits[c] * weight[c] + Σ signal points`, saturated at 100. The
//! weight table is explicit so each taxonomy variant is just another
//! [`WeightScheme`], never another code path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lexicon::LexiconRegistry;
use crate::matcher::Breakdown;
use crate::signals::SignalContribution;

/// Upper bound of every score.
pub const MAX_SCORE: u8 = 100;

/// Saturating conversion of raw points into a 0-100 score.
pub fn clamp_score(raw: u64) -> u8 {
    raw.min(MAX_SCORE as u64) as u8
}

/// Points per resolved hit, per category name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightScheme {
    weights: BTreeMap<String, u32>,
}

impl WeightScheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weights declared by the registry.
    pub fn from_registry(registry: &LexiconRegistry) -> Self {
        Self {
            weights: registry
                .categories()
                .iter()
                .map(|c| (c.name.clone(), c.weight))
                .collect(),
        }
    }

    pub fn with_weight(mut self, category: impl Into<String>, weight: u32) -> Self {
        self.weights.insert(category.into(), weight);
        self
    }

    /// Apply overrides on top of the current weights.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, u32>) -> Self {
        for (category, weight) in overrides {
            self.weights.insert(category.clone(), *weight);
        }
        self
    }

    /// Weight for a category; unknown categories weigh nothing.
    pub fn weight(&self, category: &str) -> u32 {
        self.weights.get(category).copied().unwrap_or(0)
    }
}

/// Score bands for verdict labels (inclusive upper bounds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictBands {
    pub safe_max: u8,
    pub suspicious_max: u8,
    pub toxic_max: u8,
}

impl Default for VerdictBands {
    fn default() -> Self {
        Self {
            safe_max: 20,
            suspicious_max: 40,
            toxic_max: 70,
        }
    }
}

impl VerdictBands {
    pub fn level(&self, score: u8) -> ThreatLevel {
        if score <= self.safe_max {
            ThreatLevel::Safe
        } else if score <= self.suspicious_max {
            ThreatLevel::Suspicious
        } else if score <= self.toxic_max {
            ThreatLevel::Toxic
        } else {
            ThreatLevel::Critical
        }
    }
}

/// Severity band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Safe,
    Suspicious,
    Toxic,
    Critical,
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Suspicious => write!(f, "Suspicious"),
            Self::Toxic => write!(f, "Toxic"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Verdict label plus a sentence naming the dominant failure mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: ThreatLevel,
    pub summary: String,
    /// Category with the most resolved hits, if any
    pub dominant_category: Option<String>,
}

/// Aggregated score for one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub score: u8,
    pub verdict: Verdict,
    /// Resolved hits per category group
    pub breakdown: BTreeMap<String, usize>,
    /// Points from lexicon hits before clamping
    pub lexical_points: u64,
    /// Points from triggered signals before clamping
    pub signal_points: u64,
}

/// Combines lexicon hits and signal contributions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregator {
    bands: VerdictBands,
}

impl Aggregator {
    pub fn new(bands: VerdictBands) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &VerdictBands {
        &self.bands
    }

    pub fn aggregate(
        &self,
        breakdown: &Breakdown,
        signals: &[SignalContribution],
        scheme: &WeightScheme,
    ) -> Assessment {
        let lexical_points: u64 = breakdown
            .categories
            .iter()
            .map(|c| c.hits as u64 * scheme.weight(&c.name) as u64)
            .sum();
        let signal_points: u64 = signals.iter().map(|s| s.points as u64).sum();
        let score = clamp_score(lexical_points + signal_points);

        Assessment {
            score,
            verdict: self.verdict(score, breakdown),
            breakdown: breakdown.by_group(),
            lexical_points,
            signal_points,
        }
    }

    /// Band the score and name the dominant category.
    pub fn verdict(&self, score: u8, breakdown: &Breakdown) -> Verdict {
        let level = self.bands.level(score);
        let dominant = breakdown.dominant();

        let summary = match (level, dominant) {
            (ThreatLevel::Safe, None) => {
                format!("{} ({}/100): no manipulative patterns detected", level, score)
            }
            (_, None) => format!(
                "{} ({}/100): driven by tone and sourcing signals rather than specific patterns",
                level, score
            ),
            (_, Some(c)) => format!(
                "{} ({}/100): dominant pattern is {} ({} {})",
                level,
                score,
                c.label,
                c.hits,
                if c.hits == 1 { "hit" } else { "hits" }
            ),
        };

        Verdict {
            level,
            summary,
            dominant_category: dominant.map(|c| c.name.clone()),
        }
    }
}
