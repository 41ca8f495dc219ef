//! # shield-core
//!
//! A text-forensics scoring engine. It scores a block of text for
//! manipulative or hateful rhetoric and produces a forensic report: a threat
//! score, a categorical breakdown and the exact spans that triggered it.
//!
//! ## Core Components
//!
//! - **Lexicon**: versioned category/pattern taxonomies, compiled once
//! - **Matcher**: pattern search with leftmost-longest overlap resolution
//! - **Signals**: polarity, subjectivity, weak sourcing and an optional
//!   external toxicity classifier
//! - **Aggregate**: weighted, saturating score and verdict
//! - **Sentence**: per-sentence risk with a density-based document score
//! - **Evidence**: annotated text with removable markers
//! - **Engine**: the [`Scanner`] tying it together, plus batch scanning
//!
//! ## Example
//!
//! ```rust,ignore
//! use shield_core::{ScanConfig, ScanMode, Scanner, Taxonomy};
//!
//! let scanner = Scanner::builtin(Taxonomy::PersuasionPressure)?
//!     .with_config(ScanConfig::new().with_mode(ScanMode::Sentence));
//!
//! let report = scanner.scan("Act now, only an idiot would wait.").await;
//! println!("{}", report.to_markdown());
//! ```

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
#[cfg(any(feature = "gemini", feature = "http-extract"))]
mod http;
pub mod lexicon;
pub mod matcher;
pub mod report;
pub mod sentence;
pub mod signals;

mod proptest;

// Re-exports for convenience
pub use aggregate::{Aggregator, Assessment, ThreatLevel, Verdict, VerdictBands, WeightScheme};
pub use engine::{BatchConfig, BatchItem, BatchReport, ScanConfig, ScanMode, Scanner};
pub use error::{Error, Result};
pub use evidence::{AnnotatedText, EvidenceRenderer, MarkerStyle};
#[cfg(feature = "http-extract")]
pub use extract::HttpExtractor;
#[cfg(feature = "pdf")]
pub use extract::PdfExtractor;
pub use extract::{html_to_text, ContentExtractor, PassthroughExtractor, Source};
pub use lexicon::{LexiconDocument, LexiconRegistry, PatternSpec, Taxonomy};
pub use matcher::{resolve_overlaps, Breakdown, Match, ResolvedMatchSet, SpanMatcher};
pub use report::ScanReport;
pub use sentence::{
    density_score, PunctuationSplitter, SentenceRecord, SentenceRiskWeights, SentenceScan,
    SentenceScanner, SentenceSplitter,
};
#[cfg(feature = "gemini")]
pub use signals::GeminiClassifier;
pub use signals::{
    CachedClassifier, ClassifierConfig, LabelScores, LexiconSentiment, SentimentAnalyzer,
    SignalContribution, SignalKind, SignalThresholds, ToxicityClassifier, WeakSourcingDetector,
};
