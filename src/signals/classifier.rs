//! External toxicity classifier collaborator.
//!
//! A classifier maps (truncated) text to label probabilities. The engine only
//! depends on the [`ToxicityClassifier`] trait; the Gemini-backed
//! implementation is gated behind the `gemini` feature.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

/// Label → probability in [0, 1].
pub type LabelScores = BTreeMap<String, f64>;

/// Labels understood by the default weight table.
pub const TOXICITY_LABELS: &[&str] = &[
    "toxic",
    "severe_toxic",
    "obscene",
    "threat",
    "insult",
    "identity_hate",
];

/// Default character budget sent to a classifier.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 3000;

/// A remote or local text classifier.
#[async_trait]
pub trait ToxicityClassifier: Send + Sync {
    /// Classify already-truncated text.
    async fn classify(&self, text: &str) -> Result<LabelScores>;

    /// Input ceiling in characters.
    fn max_input_chars(&self) -> usize {
        DEFAULT_MAX_INPUT_CHARS
    }

    /// Provider name used in logs and error messages.
    fn provider(&self) -> &str;
}

/// Truncate to at most `max_chars` characters on a char boundary.
///
/// Returns the prefix and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Extract label scores from a free-text model reply.
///
/// The first `{` to the last `}` is parsed as a JSON object. Unknown labels and
/// non-numeric values are dropped; probabilities are clamped to [0, 1].
pub fn parse_label_scores(reply: &str) -> Result<LabelScores> {
    let start = reply
        .find('{')
        .ok_or_else(|| Error::classifier("parser", "no JSON object in reply"))?;
    let end = reply
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| Error::classifier("parser", "unterminated JSON object in reply"))?;

    let object: BTreeMap<String, Value> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| Error::classifier("parser", format!("malformed JSON: {}", e)))?;

    let scores: LabelScores = object
        .into_iter()
        .filter(|(label, _)| TOXICITY_LABELS.contains(&label.as_str()))
        .filter_map(|(label, value)| value.as_f64().map(|p| (label, p.clamp(0.0, 1.0))))
        .collect();

    if scores.is_empty() {
        return Err(Error::classifier("parser", "reply carried no known labels"));
    }
    Ok(scores)
}

/// Prompt asking a generative model for label probabilities.
pub fn build_classification_prompt(text: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Act as a forensic linguist and counter-disinformation analyst. ");
    prompt.push_str("Rate the following text for emotional manipulation, logical fallacies, ");
    prompt.push_str("hate speech, dehumanization and propaganda tactics.\n\n");
    prompt.push_str("Return ONLY a JSON object with a probability between 0 and 1 ");
    prompt.push_str("for each of these labels: ");
    prompt.push_str(&TOXICITY_LABELS.join(", "));
    prompt.push_str(".\n\nTEXT TO ANALYZE:\n\"\"\"\n");
    prompt.push_str(text);
    prompt.push_str("\n\"\"\"\n");
    prompt
}

/// Configuration for HTTP classifier clients.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Model identifier
    pub model: String,
    /// Input ceiling in characters
    pub max_input_chars: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    /// Environment variable holding the Gemini API key.
    pub const API_KEY_ENV: &'static str = "GEMINI_API_KEY";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: "gemini-1.5-flash".to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout_secs: 30,
        }
    }

    /// Read the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        match std::env::var(Self::API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(Error::Config(format!("{} is not set", Self::API_KEY_ENV))),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max.max(1);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[cfg(feature = "gemini")]
pub use gemini::GeminiClassifier;

#[cfg(feature = "gemini")]
mod gemini {
    use async_trait::async_trait;
    use reqwest::Client;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, instrument};

    use super::{
        build_classification_prompt, parse_label_scores, ClassifierConfig, LabelScores,
        ToxicityClassifier,
    };
    use crate::error::{Error, Result};
    use crate::http::build_http_client;

    /// Toxicity classifier backed by Google Gemini.
    pub struct GeminiClassifier {
        config: ClassifierConfig,
        http: Client,
    }

    impl GeminiClassifier {
        const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
        const PROVIDER: &'static str = "gemini";

        pub fn new(config: ClassifierConfig) -> Result<Self> {
            let http = build_http_client(config.timeout_secs)?;
            Ok(Self { config, http })
        }

        /// Build from `GEMINI_API_KEY`.
        pub fn from_env() -> Result<Self> {
            Self::new(ClassifierConfig::from_env()?)
        }

        fn base_url(&self) -> &str {
            self.config
                .base_url
                .as_deref()
                .unwrap_or(Self::DEFAULT_BASE_URL)
        }
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct GeminiRequest {
        contents: Vec<GeminiContent>,
        generation_config: GeminiGenerationConfig,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct GeminiContent {
        role: String,
        parts: Vec<GeminiPart>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct GeminiPart {
        text: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct GeminiGenerationConfig {
        temperature: f64,
        response_mime_type: String,
    }

    #[derive(Debug, Deserialize)]
    struct GeminiResponse {
        candidates: Vec<GeminiCandidate>,
    }

    #[derive(Debug, Deserialize)]
    struct GeminiCandidate {
        content: GeminiContent,
    }

    #[derive(Debug, Deserialize)]
    struct GeminiError {
        error: GeminiErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    struct GeminiErrorDetail {
        message: String,
    }

    fn build_request(text: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: build_classification_prompt(text),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                response_mime_type: "application/json".to_string(),
            },
        }
    }

    /// Concatenated text parts of the first candidate.
    fn reply_text(response: &GeminiResponse) -> Result<String> {
        let candidate = response.candidates.first().ok_or_else(|| {
            Error::classifier(GeminiClassifier::PROVIDER, "No candidates in response")
        })?;

        Ok(candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(""))
    }

    #[async_trait]
    impl ToxicityClassifier for GeminiClassifier {
        #[instrument(skip(self, text), fields(model = %self.config.model, chars = text.len()))]
        async fn classify(&self, text: &str) -> Result<LabelScores> {
            let request = build_request(text);

            let url = format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url(),
                self.config.model,
                self.config.api_key
            );

            let response = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    Error::classifier(Self::PROVIDER, format!("HTTP request failed: {}", e))
                })?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                Error::classifier(Self::PROVIDER, format!("Failed to read response: {}", e))
            })?;

            if !status.is_success() {
                if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                    return Err(Error::classifier(Self::PROVIDER, error.error.message));
                }
                return Err(Error::classifier(
                    Self::PROVIDER,
                    format!("API error ({}): {}", status, body),
                ));
            }

            let api_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
                Error::classifier(Self::PROVIDER, format!("Failed to parse response: {}", e))
            })?;

            let reply = reply_text(&api_response)?;
            let scores = parse_label_scores(&reply)?;
            debug!(labels = scores.len(), "gemini classification parsed");
            Ok(scores)
        }

        fn max_input_chars(&self) -> usize {
            self.config.max_input_chars
        }

        fn provider(&self) -> &str {
            Self::PROVIDER
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use pretty_assertions::assert_eq;
        use serde_json::json;

        #[test]
        fn test_request_serializes_to_camel_case() {
            let value = serde_json::to_value(build_request("they are vermin")).unwrap();

            let prompt = value["contents"][0]["parts"][0]["text"].as_str().unwrap();
            assert!(prompt.contains("they are vermin"));
            assert_eq!(value["contents"][0]["role"], json!("user"));
            assert_eq!(
                value["generationConfig"],
                json!({ "temperature": 0.0, "responseMimeType": "application/json" })
            );
            assert!(value.get("generation_config").is_none());
        }

        #[test]
        fn test_response_parses_to_label_scores() {
            let body = r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            {"text": "{\"toxic\": 0.9, "},
                            {"text": "\"threat\": 0.25, \"mood\": 0.5}"}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }"#;
            let response: GeminiResponse = serde_json::from_str(body).unwrap();
            let scores = parse_label_scores(&reply_text(&response).unwrap()).unwrap();

            let expected: LabelScores = [("threat".to_string(), 0.25), ("toxic".to_string(), 0.9)]
                .into_iter()
                .collect();
            assert_eq!(scores, expected);
        }

        #[test]
        fn test_empty_candidates_and_api_errors() {
            let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
            let err = reply_text(&response).unwrap_err();
            assert!(err.to_string().contains("No candidates"));

            let body = r#"{"error": {"code": 429, "message": "Resource exhausted"}}"#;
            let error: GeminiError = serde_json::from_str(body).unwrap();
            assert_eq!(error.error.message, "Resource exhausted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("hello", 10), ("hello", false));
        assert_eq!(truncate_chars("hello", 5), ("hello", false));
        assert_eq!(truncate_chars("hello", 3), ("hel", true));
        assert_eq!(truncate_chars("héllo", 2), ("hé", true));
        assert_eq!(truncate_chars("", 0), ("", false));
    }

    #[test]
    fn test_parse_label_scores_from_chatty_reply() {
        let reply = "Sure! Here is the rating:\n```json\n\
            {\"toxic\": 0.8, \"identity_hate\": 1.7, \"vibes\": 0.3, \"threat\": \"high\"}\n```";
        let scores = parse_label_scores(reply).unwrap();
        let expected: LabelScores = [("identity_hate".to_string(), 1.0), ("toxic".to_string(), 0.8)]
            .into_iter()
            .collect();
        assert_eq!(scores, expected);
    }

    #[test]
    fn test_parse_label_scores_rejects_garbage() {
        assert!(parse_label_scores("I cannot help with that.").is_err());
        assert!(parse_label_scores("} backwards {").is_err());
        assert!(parse_label_scores("{\"mood\": 0.4}").is_err());
    }

    #[test]
    fn test_prompt_mentions_every_label() {
        let prompt = build_classification_prompt("some text");
        for label in TOXICITY_LABELS {
            assert!(prompt.contains(label));
        }
        assert!(prompt.contains("some text"));
    }

    #[test]
    fn test_classifier_config_builder() {
        let config = ClassifierConfig::new("key")
            .with_model("gemini-2.0-flash")
            .with_max_input_chars(0)
            .with_timeout(5);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_input_chars, 1);
        assert_eq!(config.timeout_secs, 5);
        assert!(config.base_url.is_none());
    }
}
