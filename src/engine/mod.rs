//! The scan pipeline.
//!
//! ```text
//! text ─┬─ SpanMatcher ──────────┐
//!       ├─ signal extractors ────┼─ Aggregator ─ score, verdict, breakdown
//!       └─ (SentenceScanner) ────┘
//!            └─ EvidenceRenderer ─ annotated text
//! ```
//!
//! A [`Scanner`] owns a read-only registry and shared collaborators, so one
//! scanner can serve any number of concurrent scans. A scan never fails:
//! collaborator errors degrade the report instead of aborting it.

mod batch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use batch::{BatchConfig, BatchItem, BatchReport, DEFAULT_MAX_CONCURRENT};

use crate::aggregate::{Aggregator, VerdictBands, WeightScheme};
use crate::error::Result;
use crate::evidence::{AnnotatedText, EvidenceRenderer, MarkerStyle};
use crate::lexicon::{LexiconRegistry, Taxonomy};
use crate::matcher::{Breakdown, ResolvedMatchSet, SpanMatcher};
use crate::report::{digest, ScanReport};
use crate::sentence::{
    PunctuationSplitter, SentenceRiskWeights, SentenceScanner, SentenceSplitter,
};
use crate::signals::{
    classifier_signal, polarity_signal, subjectivity_signal, weak_sourcing_signal,
    ClassifierOutcome, LexiconSentiment, SentimentAnalyzer, SignalThresholds, ToxicityClassifier,
    WeakSourcingDetector,
};

/// Scoring strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Flat sum of weighted hits and signal bonuses over the whole text
    #[default]
    Document,
    /// Per-sentence risk, document score from flagged-sentence density
    Sentence,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Sentence => write!(f, "sentence"),
        }
    }
}

/// Scan configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub mode: ScanMode,
    pub thresholds: SignalThresholds,
    pub bands: VerdictBands,
    /// Per-category weights replacing the lexicon's declared ones
    #[serde(default)]
    pub weight_overrides: BTreeMap<String, u32>,
    pub sentence_weights: SentenceRiskWeights,
    /// Sentences with risk above this are flagged
    pub sentence_risk_threshold: u8,
    pub density_multiplier: f64,
    /// Consult the classifier, when one is attached (document mode only)
    pub use_classifier: bool,
    /// Ceiling on one classifier call
    pub classifier_timeout_ms: Option<u64>,
    pub marker_style: MarkerStyle,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Document,
            thresholds: SignalThresholds::default(),
            bands: VerdictBands::default(),
            weight_overrides: BTreeMap::new(),
            sentence_weights: SentenceRiskWeights::default(),
            sentence_risk_threshold: SentenceScanner::DEFAULT_RISK_THRESHOLD,
            density_multiplier: SentenceScanner::DEFAULT_DENSITY_MULTIPLIER,
            use_classifier: true,
            classifier_timeout_ms: Some(30_000),
            marker_style: MarkerStyle::Html,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_thresholds(mut self, thresholds: SignalThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_bands(mut self, bands: VerdictBands) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_weight(mut self, category: impl Into<String>, weight: u32) -> Self {
        self.weight_overrides.insert(category.into(), weight);
        self
    }

    pub fn with_sentence_weights(mut self, weights: SentenceRiskWeights) -> Self {
        self.sentence_weights = weights;
        self
    }

    pub fn with_sentence_risk_threshold(mut self, threshold: u8) -> Self {
        self.sentence_risk_threshold = threshold;
        self
    }

    pub fn with_density_multiplier(mut self, multiplier: f64) -> Self {
        self.density_multiplier = multiplier;
        self
    }

    pub fn with_classifier_enabled(mut self, enabled: bool) -> Self {
        self.use_classifier = enabled;
        self
    }

    pub fn with_classifier_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.classifier_timeout_ms = timeout_ms;
        self
    }

    pub fn with_marker_style(mut self, style: MarkerStyle) -> Self {
        self.marker_style = style;
        self
    }
}

/// Scores texts against one lexicon.
#[derive(Clone)]
pub struct Scanner {
    registry: Arc<LexiconRegistry>,
    weights: WeightScheme,
    sentiment: Arc<dyn SentimentAnalyzer>,
    splitter: Arc<dyn SentenceSplitter>,
    sourcing: WeakSourcingDetector,
    classifier: Option<Arc<dyn ToxicityClassifier>>,
    config: ScanConfig,
    aggregator: Aggregator,
    renderer: EvidenceRenderer,
}

impl Scanner {
    /// Scanner with the built-in sentiment model and splitter, no classifier.
    pub fn new(registry: impl Into<Arc<LexiconRegistry>>) -> Self {
        let registry = registry.into();
        let config = ScanConfig::default();
        Self {
            weights: WeightScheme::from_registry(&registry),
            registry,
            sentiment: Arc::new(LexiconSentiment::new()),
            splitter: Arc::new(PunctuationSplitter::new()),
            sourcing: WeakSourcingDetector::default(),
            classifier: None,
            aggregator: Aggregator::new(config.bands.clone()),
            renderer: EvidenceRenderer::new(config.marker_style),
            config,
        }
    }

    /// Scanner over a built-in taxonomy.
    pub fn builtin(taxonomy: Taxonomy) -> Result<Self> {
        Ok(Self::new(LexiconRegistry::builtin(taxonomy)?))
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.weights =
            WeightScheme::from_registry(&self.registry).with_overrides(&config.weight_overrides);
        self.aggregator = Aggregator::new(config.bands.clone());
        self.renderer = EvidenceRenderer::new(config.marker_style);
        self.config = config;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_splitter(mut self, splitter: Arc<dyn SentenceSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_sourcing(mut self, sourcing: WeakSourcingDetector) -> Self {
        self.sourcing = sourcing;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ToxicityClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn registry(&self) -> &LexiconRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn weights(&self) -> &WeightScheme {
        &self.weights
    }

    /// Scan without consulting the classifier.
    pub fn scan_lexical(&self, text: &str) -> ScanReport {
        self.build_report(text, None)
    }

    /// Full scan. Infallible: collaborator failures only degrade the report.
    #[instrument(
        skip(self, text),
        fields(
            taxonomy = %self.registry.name(),
            mode = %self.config.mode,
            chars = text.len()
        )
    )]
    pub async fn scan(&self, text: &str) -> ScanReport {
        let outcome = match (&self.classifier, self.config.mode) {
            (Some(classifier), ScanMode::Document)
                if self.config.use_classifier && !text.trim().is_empty() =>
            {
                let timeout = self.config.classifier_timeout_ms.map(Duration::from_millis);
                let signal = classifier_signal(
                    classifier.as_ref(),
                    text,
                    &self.config.thresholds,
                    timeout,
                )
                .await;
                Some(signal)
            }
            _ => None,
        };
        self.build_report(text, outcome)
    }

    fn build_report(&self, text: &str, outcome: Option<ClassifierOutcome>) -> ScanReport {
        let input_chars = text.chars().count();
        if text.trim().is_empty() {
            return self.empty_report(text, input_chars);
        }

        let resolved = SpanMatcher::new(&self.registry).scan(text);
        let annotated = self.renderer.render(text, &resolved);

        let report = match self.config.mode {
            ScanMode::Document => {
                self.document_report(text, input_chars, resolved, annotated, outcome)
            }
            ScanMode::Sentence => self.sentence_report(text, input_chars, resolved, annotated),
        };

        debug!(
            score = report.score,
            matches = report.matches.len(),
            degraded = report.degraded.len(),
            "scan complete"
        );
        report
    }

    fn document_report(
        &self,
        text: &str,
        input_chars: usize,
        resolved: ResolvedMatchSet,
        annotated: AnnotatedText,
        outcome: Option<ClassifierOutcome>,
    ) -> ScanReport {
        let thresholds = &self.config.thresholds;
        let mut signals = vec![
            polarity_signal(self.sentiment.as_ref(), text, thresholds),
            subjectivity_signal(self.sentiment.as_ref(), text, thresholds),
            weak_sourcing_signal(&self.sourcing, text, thresholds),
        ];

        let (classifier_labels, analyzed_chars, truncated) = match outcome {
            Some(outcome) => {
                signals.push(outcome.contribution);
                (outcome.labels, outcome.analyzed_chars, outcome.truncated)
            }
            None => (Default::default(), input_chars, false),
        };

        let assessment = self
            .aggregator
            .aggregate(&resolved.breakdown, &signals, &self.weights);
        let degraded = signals.iter().filter_map(|s| s.degraded.clone()).collect();

        ScanReport {
            taxonomy: self.registry.name().to_string(),
            taxonomy_version: self.registry.version(),
            mode: ScanMode::Document,
            digest: digest(text),
            score: assessment.score,
            defense_tip: self.defense_tip(assessment.verdict.dominant_category.as_deref()),
            verdict: assessment.verdict,
            breakdown: assessment.breakdown,
            categories: resolved.breakdown.categories,
            matches: resolved.matches,
            sentences: Vec::new(),
            total_sentences: 0,
            signals,
            classifier_labels,
            annotated,
            input_chars,
            analyzed_chars,
            truncated,
            degraded,
        }
    }

    fn sentence_report(
        &self,
        text: &str,
        input_chars: usize,
        resolved: ResolvedMatchSet,
        annotated: AnnotatedText,
    ) -> ScanReport {
        let scan = SentenceScanner::new(
            &self.registry,
            self.sentiment.as_ref(),
            self.splitter.as_ref(),
            &self.sourcing,
        )
        .with_weights(self.config.sentence_weights.clone())
        .with_risk_threshold(self.config.sentence_risk_threshold)
        .with_density_multiplier(self.config.density_multiplier)
        .scan(text);

        let verdict = self.aggregator.verdict(scan.score, &resolved.breakdown);

        ScanReport {
            taxonomy: self.registry.name().to_string(),
            taxonomy_version: self.registry.version(),
            mode: ScanMode::Sentence,
            digest: digest(text),
            score: scan.score,
            defense_tip: self.defense_tip(verdict.dominant_category.as_deref()),
            verdict,
            breakdown: resolved.breakdown.by_group(),
            categories: resolved.breakdown.categories,
            matches: resolved.matches,
            sentences: scan.records,
            total_sentences: scan.total_sentences,
            signals: Vec::new(),
            classifier_labels: Default::default(),
            annotated,
            input_chars,
            analyzed_chars: input_chars,
            truncated: false,
            degraded: scan.degraded,
        }
    }

    /// Zero report for empty or whitespace-only input.
    fn empty_report(&self, text: &str, input_chars: usize) -> ScanReport {
        let resolved = ResolvedMatchSet {
            matches: Vec::new(),
            breakdown: Breakdown::empty(&self.registry),
        };
        let verdict = self.aggregator.verdict(0, &resolved.breakdown);

        ScanReport {
            taxonomy: self.registry.name().to_string(),
            taxonomy_version: self.registry.version(),
            mode: self.config.mode,
            digest: digest(text),
            score: 0,
            verdict,
            breakdown: resolved.breakdown.by_group(),
            categories: resolved.breakdown.categories,
            matches: Vec::new(),
            sentences: Vec::new(),
            total_sentences: 0,
            signals: Vec::new(),
            classifier_labels: Default::default(),
            annotated: AnnotatedText {
                text: text.to_string(),
                markers: Vec::new(),
            },
            input_chars,
            analyzed_chars: input_chars,
            truncated: false,
            degraded: Vec::new(),
            defense_tip: None,
        }
    }

    fn defense_tip(&self, dominant: Option<&str>) -> Option<String> {
        dominant
            .and_then(|name| self.registry.category(name))
            .and_then(|category| category.defense.clone())
    }
}
