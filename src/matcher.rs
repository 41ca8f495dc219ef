//! Span matcher with deterministic overlap resolution.
//!
//! Every pattern of every category is searched independently. The candidates
//! are then sorted by `(start asc, length desc)` and swept left to right: a
//! candidate is accepted only if it starts at or after the end of the last
//! accepted one. The sort is stable and candidates are generated in category
//! declaration order, then pattern order, so equal spans at the same offset go
//! to the first-declared category.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::lexicon::LexiconRegistry;

/// A raw pattern occurrence before overlap resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Byte offset of the first matched byte
    pub start: usize,
    /// Byte offset one past the last matched byte
    pub end: usize,
    /// Index of the owning category in the registry
    pub category_index: usize,
    /// Index of the pattern within its category
    pub pattern_index: usize,
}

impl Candidate {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An accepted, non-overlapping match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Byte range in the scanned text
    pub start: usize,
    pub end: usize,
    /// Character range in the scanned text
    pub char_start: usize,
    pub char_end: usize,
    /// Matched substring, as it appears in the text
    pub text: String,
    pub category: String,
    pub label: String,
    pub group: String,
    pub color: String,
    pub weight: u32,
    #[serde(skip)]
    pub category_index: usize,
}

/// Hit count for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub label: String,
    pub group: String,
    pub hits: usize,
}

/// Per-category hit counts over resolved matches, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub categories: Vec<CategoryCount>,
}

impl Breakdown {
    /// An all-zero breakdown for every category of the registry.
    pub fn empty(registry: &LexiconRegistry) -> Self {
        Self {
            categories: registry
                .categories()
                .iter()
                .map(|c| CategoryCount {
                    name: c.name.clone(),
                    label: c.label.clone(),
                    group: c.group.clone(),
                    hits: 0,
                })
                .collect(),
        }
    }

    /// Count resolved matches per category.
    pub fn from_matches(registry: &LexiconRegistry, matches: &[Match]) -> Self {
        let mut breakdown = Self::empty(registry);
        for m in matches {
            if let Some(count) = breakdown.categories.get_mut(m.category_index) {
                count.hits += 1;
            }
        }
        breakdown
    }

    /// Hits for a category name (0 if unknown).
    pub fn hits(&self, category: &str) -> usize {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map_or(0, |c| c.hits)
    }

    pub fn total_hits(&self) -> usize {
        self.categories.iter().map(|c| c.hits).sum()
    }

    /// Number of categories with at least one hit.
    pub fn categories_hit(&self) -> usize {
        self.categories.iter().filter(|c| c.hits > 0).count()
    }

    /// Hit counts summed per group. Every declared group is present.
    pub fn by_group(&self) -> BTreeMap<String, usize> {
        let mut groups = BTreeMap::new();
        for c in &self.categories {
            *groups.entry(c.group.clone()).or_insert(0) += c.hits;
        }
        groups
    }

    /// Category with the most hits; the first-declared one wins ties.
    pub fn dominant(&self) -> Option<&CategoryCount> {
        let mut best: Option<&CategoryCount> = None;
        for c in self.categories.iter().filter(|c| c.hits > 0) {
            if best.map_or(true, |b| c.hits > b.hits) {
                best = Some(c);
            }
        }
        best
    }
}

/// Non-overlapping matches sorted by start, plus their breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMatchSet {
    pub matches: Vec<Match>,
    pub breakdown: Breakdown,
}

impl ResolvedMatchSet {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }
}

/// Greedy leftmost-longest sweep over candidates.
///
/// Returns the accepted candidates ordered by start offset. Empty candidates
/// are dropped.
pub fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.retain(|c| !c.is_empty());
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));

    let mut accepted = Vec::new();
    let mut last_end = 0;
    for candidate in candidates {
        if candidate.start >= last_end {
            last_end = candidate.end;
            accepted.push(candidate);
        }
    }
    accepted
}

/// Scans text against every pattern of a registry.
#[derive(Debug, Clone, Copy)]
pub struct SpanMatcher<'a> {
    registry: &'a LexiconRegistry,
}

impl<'a> SpanMatcher<'a> {
    pub fn new(registry: &'a LexiconRegistry) -> Self {
        Self { registry }
    }

    /// Every pattern occurrence, in category/pattern declaration order.
    pub fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for (category_index, category) in self.registry.categories().iter().enumerate() {
            for (pattern_index, pattern) in category.patterns.iter().enumerate() {
                candidates.extend(pattern.regex.find_iter(text).map(|m| Candidate {
                    start: m.start(),
                    end: m.end(),
                    category_index,
                    pattern_index,
                }));
            }
        }
        candidates
    }

    /// Find, resolve and materialize matches.
    pub fn scan(&self, text: &str) -> ResolvedMatchSet {
        if text.is_empty() {
            return ResolvedMatchSet {
                matches: Vec::new(),
                breakdown: Breakdown::empty(self.registry),
            };
        }

        let accepted = resolve_overlaps(self.candidates(text));

        let categories = self.registry.categories();
        let mut matches = Vec::with_capacity(accepted.len());
        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        for candidate in accepted {
            char_cursor += text[byte_cursor..candidate.start].chars().count();
            let char_start = char_cursor;
            let matched = &text[candidate.start..candidate.end];
            char_cursor += matched.chars().count();
            byte_cursor = candidate.end;

            let category = &categories[candidate.category_index];
            matches.push(Match {
                start: candidate.start,
                end: candidate.end,
                char_start,
                char_end: char_cursor,
                text: matched.to_string(),
                category: category.name.clone(),
                label: category.label.clone(),
                group: category.group.clone(),
                color: category.color.clone(),
                weight: category.weight,
                category_index: candidate.category_index,
            });
        }

        let breakdown = Breakdown::from_matches(self.registry, &matches);
        ResolvedMatchSet { matches, breakdown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{CategoryConfig, LexiconDocument, PatternSpec, Taxonomy};
    use pretty_assertions::assert_eq;

    fn category(
        name: &str,
        group: &str,
        weight: u32,
        patterns: Vec<PatternSpec>,
    ) -> CategoryConfig {
        CategoryConfig {
            name: name.into(),
            label: name.to_uppercase(),
            group: group.into(),
            weight,
            color: "#ffffff".into(),
            defense: None,
            patterns,
        }
    }

    fn registry(categories: Vec<CategoryConfig>) -> LexiconRegistry {
        LexiconRegistry::from_document(LexiconDocument {
            name: "test".into(),
            version: 1,
            description: String::new(),
            categories,
        })
        .unwrap()
    }

    fn lit(s: &str) -> PatternSpec {
        PatternSpec::Literal(s.into())
    }

    fn texts(set: &ResolvedMatchSet) -> Vec<&str> {
        set.matches.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_longest_match_wins_at_same_offset() {
        let reg = registry(vec![category(
            "urgency",
            "pressure",
            15,
            vec![lit("act"), lit("act now")],
        )]);
        let set = SpanMatcher::new(&reg).scan("Act now");
        assert_eq!(texts(&set), vec!["Act now"]);
        assert_eq!(set.breakdown.hits("urgency"), 1);
    }

    #[test]
    fn test_longest_wins_across_categories() {
        let reg = registry(vec![
            category("emotion", "emotion", 10, vec![lit("act")]),
            category("urgency", "pressure", 15, vec![lit("act now")]),
        ]);
        let set = SpanMatcher::new(&reg).scan("You must act now.");
        assert_eq!(texts(&set), vec!["act now"]);
        assert_eq!(set.matches[0].category, "urgency");
        assert_eq!(set.breakdown.hits("emotion"), 0);
    }

    #[test]
    fn test_equal_span_tie_goes_to_first_declared_category() {
        let reg = registry(vec![
            category("fear", "emotion", 10, vec![lit("doom")]),
            category("hype", "emotion", 10, vec![lit("doom")]),
        ]);
        let set = SpanMatcher::new(&reg).scan("doom and doom");
        assert_eq!(set.len(), 2);
        assert!(set.matches.iter().all(|m| m.category == "fear"));
    }

    #[test]
    fn test_overlapping_later_candidate_rejected() {
        let reg = registry(vec![category(
            "x",
            "g",
            1,
            vec![lit("abc"), lit("bcd"), lit("de")],
        )]);
        // "abc" accepted at 0..3, "bcd" at 1..4 overlaps, "de" at 3..5 accepted.
        let set = SpanMatcher::new(&reg).scan("abcde");
        assert_eq!(texts(&set), vec!["abc", "de"]);
    }

    #[test]
    fn test_capture_groups_use_whole_span() {
        let reg = registry(vec![category(
            "betrayal",
            "emotion",
            10,
            vec![PatternSpec::Regex(r"\bbetray(al|ed)\b".into())],
        )]);
        let set = SpanMatcher::new(&reg).scan("A total betrayal.");
        assert_eq!(texts(&set), vec!["betrayal"]);
    }

    #[test]
    fn test_char_offsets_with_multibyte_text() {
        let reg = registry(vec![category("fear", "emotion", 10, vec![lit("panic")])]);
        let text = "Ünïcode — panic!";
        let set = SpanMatcher::new(&reg).scan(text);
        let m = &set.matches[0];
        assert_eq!(&text[m.start..m.end], "panic");
        let chars: Vec<char> = text.chars().collect();
        let by_chars: String = chars[m.char_start..m.char_end].iter().collect();
        assert_eq!(by_chars, "panic");
        assert!(m.start > m.char_start);
    }

    #[test]
    fn test_empty_input() {
        let reg = LexiconRegistry::builtin(Taxonomy::PersuasionPressure).unwrap();
        let set = SpanMatcher::new(&reg).scan("");
        assert!(set.is_empty());
        assert_eq!(set.breakdown.total_hits(), 0);
        assert_eq!(set.breakdown.categories.len(), reg.categories().len());
    }

    #[test]
    fn test_breakdown_counts_resolved_not_raw() {
        let reg = registry(vec![
            category("short", "a", 1, vec![lit("act")]),
            category("long", "b", 1, vec![lit("act now")]),
        ]);
        let matcher = SpanMatcher::new(&reg);
        let text = "act now, act now";
        assert_eq!(matcher.candidates(text).len(), 4);

        let set = matcher.scan(text);
        assert_eq!(set.breakdown.hits("short"), 0);
        assert_eq!(set.breakdown.hits("long"), 2);
        let groups = set.breakdown.by_group();
        assert_eq!(groups.get("a"), Some(&0));
        assert_eq!(groups.get("b"), Some(&2));
    }

    #[test]
    fn test_dominant_tie_break_first_declared() {
        let reg = registry(vec![
            category("first", "g", 1, vec![lit("alpha")]),
            category("second", "g", 1, vec![lit("beta")]),
        ]);
        let set = SpanMatcher::new(&reg).scan("beta alpha");
        assert_eq!(set.breakdown.dominant().unwrap().name, "first");

        let set = SpanMatcher::new(&reg).scan("beta alpha beta");
        assert_eq!(set.breakdown.dominant().unwrap().name, "second");
    }

    #[test]
    fn test_resolve_overlaps_drops_empty() {
        let accepted = resolve_overlaps(vec![
            Candidate {
                start: 2,
                end: 2,
                category_index: 0,
                pattern_index: 0,
            },
            Candidate {
                start: 2,
                end: 4,
                category_index: 0,
                pattern_index: 1,
            },
        ]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].end, 4);
    }

    #[test]
    fn test_builtin_lexicon_prefers_longer_insult() {
        let reg = LexiconRegistry::builtin(Taxonomy::PersuasionPressure).unwrap();
        let set = SpanMatcher::new(&reg).scan("Only an idiot would believe this.");
        assert_eq!(texts(&set), vec!["Only an idiot"]);
        assert_eq!(set.matches[0].category, "ad_hominem");
    }
}
