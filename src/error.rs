//! Error types for shield-core.
//!
//! Only configuration errors ever reach the caller of a scan. Collaborator
//! errors (classifier, sentiment, extraction) are produced by the collaborator
//! traits and absorbed by the engine, which records them as degraded signals.

use thiserror::Error;

/// Result type alias using shield-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or feeding the scoring engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Lexicon or scan configuration is malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lexicon pattern failed to compile
    #[error("Invalid pattern {pattern:?} in category {category:?}: {source}")]
    InvalidPattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External classifier failed or returned garbage
    #[error("Classifier error: {provider} - {message}")]
    Classifier { provider: String, message: String },

    /// Sentiment collaborator failed
    #[error("Sentiment analysis error: {0}")]
    Sentiment(String),

    /// Content extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Timeout during a collaborator call
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

impl Error {
    /// Create an invalid pattern error.
    pub fn pattern(
        category: impl Into<String>,
        pattern: impl Into<String>,
        source: regex::Error,
    ) -> Self {
        Self::InvalidPattern {
            category: category.into(),
            pattern: pattern.into(),
            source,
        }
    }

    /// Create a classifier error.
    pub fn classifier(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Classifier {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Whether this error is a configuration problem (fatal, never absorbed).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidPattern { .. } | Self::Serialization(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        let bad = regex::Regex::new("(").unwrap_err();
        assert!(Error::pattern("fear", "(", bad).is_configuration());
        assert!(Error::Config("empty lexicon".into()).is_configuration());
        assert!(!Error::classifier("gemini", "503").is_configuration());
        assert!(!Error::timeout(500).is_configuration());
    }

    #[test]
    fn test_display() {
        let err = Error::classifier("gemini", "quota exceeded");
        assert_eq!(err.to_string(), "Classifier error: gemini - quota exceeded");
        assert_eq!(
            Error::timeout(250).to_string(),
            "Operation timed out after 250ms"
        );
    }
}
