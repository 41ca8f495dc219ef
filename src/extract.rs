//! Content extraction collaborator.
//!
//! Turns a [`Source`] into raw text for scanning. Failure is an `Err`, which
//! is distinct from a source that yields no text (`Ok("")`).

use std::io::Cursor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Line width handed to the HTML renderer, wide enough that paragraphs are
/// not wrapped mid-phrase.
const RENDER_WIDTH: usize = 10_000;

/// Where text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Text(String),
    Url(String),
    /// An uploaded file
    Document {
        name: Option<String>,
        bytes: Vec<u8>,
    },
}

impl Source {
    /// Treat `http://` and `https://` input as a URL, anything else as text.
    pub fn detect(input: impl Into<String>) -> Self {
        let input = input.into();
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        if (lower.starts_with("http://") || lower.starts_with("https://"))
            && !trimmed.contains(char::is_whitespace)
        {
            Source::Url(trimmed.to_string())
        } else {
            Source::Text(input)
        }
    }

    /// An uploaded document.
    pub fn document(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Source::Document {
            name: Some(name.into()),
            bytes: bytes.into(),
        }
    }

    /// Short description for error messages.
    fn describe(&self) -> String {
        match self {
            Source::Text(_) => "raw text".to_string(),
            Source::Url(url) => url.clone(),
            Source::Document { name: Some(name), .. } => name.clone(),
            Source::Document { name: None, bytes } => {
                format!("document ({} bytes)", bytes.len())
            }
        }
    }
}

/// Produces raw text from a source.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, source: &Source) -> Result<String>;
}

fn unsupported(source: &Source, extractor: &str) -> Error {
    Error::Extraction(format!(
        "{} cannot handle {}",
        extractor,
        source.describe()
    ))
}

/// Returns raw text unchanged and refuses everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl ContentExtractor for PassthroughExtractor {
    async fn extract(&self, source: &Source) -> Result<String> {
        match source {
            Source::Text(text) => Ok(text.clone()),
            other => Err(unsupported(other, "passthrough extractor")),
        }
    }
}

/// Reduce an HTML page to its visible text.
///
/// Rendering is delegated to `html2text`; the result is tidied so each line
/// has single spaces and paragraphs are separated by one blank line.
pub fn html_to_text(html: &str) -> Result<String> {
    let rendered = html2text::from_read(Cursor::new(html.as_bytes()), RENDER_WIDTH)
        .map_err(|e| Error::Extraction(format!("HTML rendering failed: {}", e)))?;
    Ok(tidy_lines(&rendered))
}

fn tidy_lines(text: &str) -> String {
    let mut out = String::new();
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() || is_rule(&line) {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        pending_blank = false;
        out.push_str(&line);
    }
    out
}

// Horizontal rules render as a run of box-drawing or dash characters
fn is_rule(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '─' | '━' | '═' | '-' | '=' | '_'))
}

#[cfg(feature = "http-extract")]
pub use fetch::HttpExtractor;

#[cfg(feature = "http-extract")]
mod fetch {
    use async_trait::async_trait;
    use reqwest::Client;
    use tracing::{debug, instrument};

    use super::{html_to_text, unsupported, ContentExtractor, Source};
    use crate::error::{Error, Result};
    use crate::http::build_http_client;

    /// Fetches URLs over HTTP and reduces HTML to visible text.
    pub struct HttpExtractor {
        http: Client,
    }

    impl HttpExtractor {
        pub fn new(timeout_secs: u64) -> Result<Self> {
            Ok(Self {
                http: build_http_client(timeout_secs)?,
            })
        }
    }

    #[async_trait]
    impl ContentExtractor for HttpExtractor {
        #[instrument(skip(self, source))]
        async fn extract(&self, source: &Source) -> Result<String> {
            let url = match source {
                Source::Text(text) => return Ok(text.clone()),
                Source::Url(url) => url,
                other => return Err(unsupported(other, "HTTP extractor")),
            };

            let response = self
                .http
                .get(url)
                .header(
                    "user-agent",
                    concat!("shield-core/", env!("CARGO_PKG_VERSION")),
                )
                .send()
                .await
                .map_err(|e| Error::Extraction(format!("HTTP request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Extraction(format!("{} returned {}", url, status)));
            }

            let is_html = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map_or(true, |v| v.contains("html"));

            let body = response
                .text()
                .await
                .map_err(|e| Error::Extraction(format!("Failed to read response: {}", e)))?;

            let text = if is_html { html_to_text(&body)? } else { body };
            debug!(url = %url, chars = text.len(), "extracted page text");
            Ok(text)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_text_passes_through_without_network() {
            let extractor = HttpExtractor::new(5).unwrap();
            let text = extractor
                .extract(&Source::Text("already text".into()))
                .await
                .unwrap();
            assert_eq!(text, "already text");
        }

        #[tokio::test]
        async fn test_documents_are_refused() {
            let extractor = HttpExtractor::new(5).unwrap();
            let err = extractor
                .extract(&Source::document("leaflet.pdf", b"%PDF".to_vec()))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Extraction(ref m) if m.contains("leaflet.pdf")));
        }
    }
}

#[cfg(feature = "pdf")]
pub use pdf::PdfExtractor;

#[cfg(feature = "pdf")]
mod pdf {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use async_trait::async_trait;
    use tracing::{debug, instrument};

    use super::{unsupported, ContentExtractor, Source};
    use crate::error::{Error, Result};

    /// Pulls the text layer out of uploaded PDF documents.
    ///
    /// Scanned PDFs without a text layer yield `Ok("")`; unreadable bytes are
    /// an extraction error.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct PdfExtractor;

    impl PdfExtractor {
        /// Extract text from in-memory PDF bytes.
        pub fn extract_bytes(bytes: &[u8]) -> Result<String> {
            // pdf-extract panics on some malformed inputs instead of erroring.
            match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
                Ok(Ok(text)) => Ok(text.trim().to_string()),
                Ok(Err(e)) => Err(Error::Extraction(format!("unreadable PDF: {}", e))),
                Err(_) => Err(Error::Extraction(
                    "unreadable PDF: parser aborted".to_string(),
                )),
            }
        }
    }

    #[async_trait]
    impl ContentExtractor for PdfExtractor {
        #[instrument(skip(self, source))]
        async fn extract(&self, source: &Source) -> Result<String> {
            match source {
                Source::Text(text) => Ok(text.clone()),
                Source::Document { bytes, .. } => {
                    let text = Self::extract_bytes(bytes)?;
                    debug!(bytes = bytes.len(), chars = text.len(), "extracted PDF text");
                    Ok(text)
                }
                other => Err(unsupported(other, "PDF extractor")),
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_detection() {
        assert_eq!(
            Source::detect("  https://example.com/story "),
            Source::Url("https://example.com/story".into())
        );
        assert_eq!(
            Source::detect("HTTP://EXAMPLE.COM"),
            Source::Url("HTTP://EXAMPLE.COM".into())
        );
        assert_eq!(
            Source::detect("http is a protocol"),
            Source::Text("http is a protocol".into())
        );
        assert_eq!(
            Source::detect("https://a.com and more words"),
            Source::Text("https://a.com and more words".into())
        );
    }

    #[tokio::test]
    async fn test_passthrough_extractor() {
        let extractor = PassthroughExtractor;
        assert_eq!(
            extractor.extract(&Source::Text(String::new())).await.unwrap(),
            ""
        );
        assert_eq!(
            extractor.extract(&Source::Text("raw".into())).await.unwrap(),
            "raw"
        );
        let err = extractor
            .extract(&Source::Url("https://example.com".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));

        let err = extractor
            .extract(&Source::Document {
                name: None,
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(ref m) if m.contains("document (3 bytes)")));
    }

    #[test]
    fn test_html_to_text_keeps_bare_angle_brackets_and_decodes_entities() {
        let html = "<p>If 3 &lt; 5 and 7 > 2 then act now.</p>\
                    <p>If 3 < 5 it still reads.</p>\
                    <p>&ldquo;Caf&eacute;&rdquo; &#8220;x&#8221;</p>";
        let text = html_to_text(html).unwrap();
        assert!(text.contains("If 3 < 5 and 7 > 2 then act now."), "{text}");
        assert!(text.contains("If 3 < 5 it still reads."), "{text}");
        assert!(text.contains("“Café” “x”"), "{text}");
        assert!(!text.contains("&#"));
    }

    #[test]
    fn test_html_to_text_drops_scripts() {
        let html = r#"<html><body>
  <script>var secret = "hidden payload";</script>
  <p>Act now &amp; share.</p>
  <div>one</div><div>two</div>
</body></html>"#;
        let text = html_to_text(html).unwrap();
        assert!(text.contains("Act now & share."), "{text}");
        assert!(text.contains("one"));
        assert!(text.contains("two"));
        assert!(!text.contains("hidden payload"));
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("just text").unwrap(), "just text");
        assert_eq!(html_to_text("").unwrap(), "");
    }

    #[test]
    fn test_tidy_lines() {
        assert_eq!(
            tidy_lines("  a   b \n\n\n\nc\n───────\nd\n\n"),
            "a b\n\nc\n\nd"
        );
        assert_eq!(tidy_lines("\n\n"), "");
    }
}
