//! Evidence rendering.
//!
//! Wraps every resolved match in a marker while leaving all other text byte
//! for byte intact. Markers are inserted right to left over a copy of the
//! input, so inserting one never shifts an offset that is still pending.
//! Marker positions in the output are recorded, which makes stripping them
//! exact even when the input itself contains marker-like text.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::matcher::{Match, ResolvedMatchSet};

/// Marker syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    /// `<mark data-category=".." style="background-color: ..">..</mark>`
    #[default]
    Html,
    /// `[[label: ..]]`, for terminals and plain-text reports
    Bracket,
}

/// Annotated text plus the byte ranges of every inserted marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedText {
    pub text: String,
    /// Sorted, non-overlapping byte ranges of inserted markers
    pub markers: Vec<Range<usize>>,
}

impl AnnotatedText {
    /// Remove every inserted marker, reconstructing the input exactly.
    pub fn strip_markers(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for marker in &self.markers {
            out.push_str(&self.text[cursor..marker.start]);
            cursor = marker.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

/// Renders resolved matches into annotated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRenderer {
    style: MarkerStyle,
}

impl EvidenceRenderer {
    pub fn new(style: MarkerStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> MarkerStyle {
        self.style
    }

    /// Annotate `text` with the matches of `resolved`.
    ///
    /// The matched text itself is never escaped, so the output is only safe
    /// to embed as HTML when the input is.
    pub fn render(&self, text: &str, resolved: &ResolvedMatchSet) -> AnnotatedText {
        let wrappers: Vec<(String, &'static str)> = resolved
            .matches
            .iter()
            .map(|m| self.wrappers(m))
            .collect();

        let mut buffer = text.to_string();
        for (m, (open, close)) in resolved.matches.iter().zip(&wrappers).rev() {
            buffer.insert_str(m.end, close);
            buffer.insert_str(m.start, open);
        }

        let mut markers = Vec::with_capacity(wrappers.len() * 2);
        let mut shift = 0;
        for (m, (open, close)) in resolved.matches.iter().zip(&wrappers) {
            let open_start = m.start + shift;
            markers.push(open_start..open_start + open.len());
            shift += open.len();

            let close_start = m.end + shift;
            markers.push(close_start..close_start + close.len());
            shift += close.len();
        }

        AnnotatedText {
            text: buffer,
            markers,
        }
    }

    fn wrappers(&self, m: &Match) -> (String, &'static str) {
        match self.style {
            MarkerStyle::Html => (
                format!(
                    "<mark data-category=\"{}\" title=\"{}\" style=\"background-color: {}\">",
                    escape_attribute(&m.category),
                    escape_attribute(&m.label),
                    escape_attribute(&m.color)
                ),
                "</mark>",
            ),
            MarkerStyle::Bracket => (format!("[[{}: ", m.label), "]]"),
        }
    }
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
