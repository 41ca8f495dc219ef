//! Scan reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregate::Verdict;
use crate::engine::ScanMode;
use crate::evidence::AnnotatedText;
use crate::matcher::{CategoryCount, Match};
use crate::sentence::SentenceRecord;
use crate::signals::{LabelScores, SignalContribution};

/// Fallback advice when the dominant category carries no defense tip.
pub const DEFAULT_DEFENSE_TIP: &str = "Slow down before sharing: check who is making the claim, \
    what evidence is cited, and whether the wording is built to provoke rather than inform.";

/// SHA-256 hex digest of the scanned text.
pub fn digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// The single output artifact of one analysis.
///
/// Contains no timestamps or random identifiers: scanning the same text with
/// the same configuration and collaborators yields an equal report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Lexicon name and version the text was scanned against
    pub taxonomy: String,
    pub taxonomy_version: u32,
    pub mode: ScanMode,
    /// SHA-256 of the input text
    pub digest: String,
    /// Overall threat score, 0-100
    pub score: u8,
    pub verdict: Verdict,
    /// Resolved hits per category group
    pub breakdown: BTreeMap<String, usize>,
    /// Resolved hits per category, in declaration order
    pub categories: Vec<CategoryCount>,
    /// Resolved matches, ordered by start
    pub matches: Vec<Match>,
    /// Flagged sentences, highest risk first (sentence mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sentences: Vec<SentenceRecord>,
    /// Sentences scanned (sentence mode; 0 in document mode)
    pub total_sentences: usize,
    /// Signal contributions (document mode)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<SignalContribution>,
    /// Raw classifier label probabilities, when a classifier answered
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifier_labels: LabelScores,
    pub annotated: AnnotatedText,
    /// Characters in the input
    pub input_chars: usize,
    /// Characters seen by the classifier, or the whole input without one
    pub analyzed_chars: usize,
    /// The classifier only saw a prefix of the input
    pub truncated: bool,
    /// Collaborator failures absorbed while scanning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
    /// Resistance tip for the dominant category
    pub defense_tip: Option<String>,
}

impl ScanReport {
    /// Whether any collaborator failed; the score may be understated.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// Render the forensic report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str("## Forensic Report\n\n");
        out.push_str("### Threat Score\n\n");
        out.push_str(&format!("**{}/100** ({})\n\n", self.score, self.verdict.level));
        out.push_str("### Verdict\n\n");
        out.push_str(&format!("{}\n", self.verdict.summary));

        if self.truncated {
            out.push_str(&format!(
                "\n> Only the first {} of {} characters were sent to the classifier.\n",
                self.analyzed_chars, self.input_chars
            ));
        }
        if self.is_degraded() {
            out.push_str(&format!(
                "\n> Reduced confidence: {}\n",
                self.degraded.join("; ")
            ));
        }

        let hit_groups: Vec<_> = self
            .breakdown
            .iter()
            .filter(|(_, hits)| **hits > 0)
            .collect();
        if !hit_groups.is_empty() {
            out.push_str("\n| Group | Hits |\n|---|---|\n");
            for (group, hits) in hit_groups {
                out.push_str(&format!("| {} | {} |\n", group, hits));
            }
        }

        out.push_str("\n### The Smoking Gun\n\n");
        let evidence = self.smoking_gun();
        if evidence.is_empty() {
            out.push_str("Nothing was flagged.\n");
        } else {
            for line in evidence {
                out.push_str(&format!("- {}\n", line));
            }
        }

        out.push_str("\n### Cognitive Defense\n\n");
        out.push_str(self.defense_tip.as_deref().unwrap_or(DEFAULT_DEFENSE_TIP));
        out.push('\n');

        out
    }

    fn smoking_gun(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.mode {
            ScanMode::Sentence => {
                for record in &self.sentences {
                    lines.push(format!(
                        "Sentence {} (risk {}): \"{}\" ({})",
                        record.index,
                        record.risk,
                        record.text,
                        record.flags.join("; ")
                    ));
                }
            }
            ScanMode::Document => {
                for m in &self.matches {
                    lines.push(format!("**{}**: \"{}\"", m.label, m.text));
                }
                for signal in self.signals.iter().filter(|s| s.triggered) {
                    if signal.evidence.is_empty() {
                        lines.push(format!("**{}**: {:.0}", signal.kind, signal.value));
                    } else {
                        lines.push(format!("**{}**: {}", signal.kind, signal.evidence.join(", ")));
                    }
                }
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ThreatLevel;
    use crate::signals::SignalKind;

    fn report(mode: ScanMode) -> ScanReport {
        ScanReport {
            taxonomy: "test".into(),
            taxonomy_version: 1,
            mode,
            digest: digest("text"),
            score: 55,
            verdict: Verdict {
                level: ThreatLevel::Toxic,
                summary: "Toxic (55/100): dominant pattern is Fear (1 hit)".into(),
                dominant_category: Some("fear".into()),
            },
            breakdown: [("emotion".to_string(), 1), ("hate".to_string(), 0)]
                .into_iter()
                .collect(),
            categories: Vec::new(),
            matches: vec![Match {
                start: 0,
                end: 6,
                char_start: 0,
                char_end: 6,
                text: "Terror".into(),
                category: "fear".into(),
                label: "Fear".into(),
                group: "emotion".into(),
                color: "#ff0000".into(),
                weight: 10,
                category_index: 0,
            }],
            sentences: vec![SentenceRecord {
                index: 2,
                text: "Terror everywhere!".into(),
                risk: 75,
                flags: vec!["Fear: \"Terror\"".into(), "High emotional intensity (90%)".into()],
            }],
            total_sentences: 3,
            signals: vec![SignalContribution {
                kind: SignalKind::WeakSourcing,
                value: 1.0,
                threshold: 0.0,
                triggered: true,
                points: 15,
                evidence: vec!["allegedly".into()],
                degraded: None,
            }],
            classifier_labels: LabelScores::new(),
            annotated: AnnotatedText::default(),
            input_chars: 5000,
            analyzed_chars: 3000,
            truncated: true,
            degraded: vec!["gemini classifier unavailable: 503".into()],
            defense_tip: None,
        }
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(digest("a"), digest("a"));
        assert_ne!(digest("a"), digest("b"));
    }

    #[test]
    fn test_markdown_sections_in_order() {
        let markdown = report(ScanMode::Document).to_markdown();
        let positions: Vec<usize> = [
            "### Threat Score",
            "### Verdict",
            "### The Smoking Gun",
            "### Cognitive Defense",
        ]
        .iter()
        .map(|heading| markdown.find(heading).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(markdown.contains("**55/100** (Toxic)"));
        assert!(markdown.contains("- **Fear**: \"Terror\""));
        assert!(markdown.contains("- **weak sourcing**: allegedly"));
        assert!(markdown.contains("Only the first 3000 of 5000 characters"));
        assert!(markdown.contains("Reduced confidence: gemini classifier unavailable: 503"));
        assert!(markdown.contains("| emotion | 1 |"));
        assert!(!markdown.contains("| hate |"));
        assert!(markdown.contains(DEFAULT_DEFENSE_TIP));
    }

    #[test]
    fn test_markdown_layout_for_clean_text() {
        let mut report = report(ScanMode::Document);
        report.score = 0;
        report.verdict = Verdict {
            level: ThreatLevel::Safe,
            summary: "Safe (0/100): no manipulative patterns detected".into(),
            dominant_category: None,
        };
        report.breakdown = BTreeMap::new();
        report.matches.clear();
        report.signals.clear();
        report.truncated = false;
        report.degraded.clear();
        report.defense_tip = Some("Stay curious.".into());

        assert_eq!(
            report.to_markdown(),
            "## Forensic Report\n\n### Threat Score\n\n**0/100** (Safe)\n\n### Verdict\n\n\
             Safe (0/100): no manipulative patterns detected\n\n### The Smoking Gun\n\n\
             Nothing was flagged.\n\n### Cognitive Defense\n\nStay curious.\n"
        );
    }

    #[test]
    fn test_markdown_sentence_mode() {
        let mut report = report(ScanMode::Sentence);
        report.defense_tip = Some("Name the fear and ask who benefits.".into());
        let markdown = report.to_markdown();
        assert!(markdown.contains(
            "- Sentence 2 (risk 75): \"Terror everywhere!\" \
             (Fear: \"Terror\"; High emotional intensity (90%))"
        ));
        assert!(!markdown.contains("**Fear**"));
        assert!(markdown.contains("Name the fear and ask who benefits."));
    }

    #[test]
    fn test_serde_round_trip() {
        let report = report(ScanMode::Document);
        let json = serde_json::to_string(&report).unwrap();
        let back: ScanReport = serde_json::from_str(&json).unwrap();
        // category_index is not serialized
        assert_eq!(back.matches[0].category_index, 0);
        assert_eq!(back, report);
        assert!(back.is_degraded());
    }
}
