//! Lexicon registry: validated, compiled category tables.

use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::debug;

use super::types::{
    Category, CategoryConfig, CompiledPattern, LexiconDocument, PatternSpec, Taxonomy,
};
use crate::error::{Error, Result};

/// Read-only table of categories and their compiled patterns.
///
/// All validation happens here; a registry that was built successfully never
/// fails at scan time. Share it behind an `Arc` across scanners and threads.
#[derive(Debug, Clone)]
pub struct LexiconRegistry {
    name: String,
    version: u32,
    description: String,
    categories: Vec<Category>,
}

impl LexiconRegistry {
    /// Load one of the built-in taxonomies.
    pub fn builtin(taxonomy: Taxonomy) -> Result<Self> {
        Self::from_json(taxonomy.document_source())
    }

    /// Parse and compile a lexicon document from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: LexiconDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Compile a lexicon document.
    pub fn from_document(document: LexiconDocument) -> Result<Self> {
        if document.categories.is_empty() {
            return Err(Error::Config(format!(
                "lexicon {:?} declares no categories",
                document.name
            )));
        }

        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(document.categories.len());
        for config in document.categories {
            if !seen.insert(config.name.clone()) {
                return Err(Error::Config(format!(
                    "duplicate category {:?} in lexicon {:?}",
                    config.name, document.name
                )));
            }
            categories.push(compile_category(config)?);
        }

        let registry = Self {
            name: document.name,
            version: document.version,
            description: document.description,
            categories,
        };
        debug!(
            lexicon = %registry.name,
            version = registry.version,
            categories = registry.categories.len(),
            patterns = registry.pattern_count(),
            "lexicon compiled"
        );
        Ok(registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Categories in declaration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by name.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Distinct groups in first-declared order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for category in &self.categories {
            if !groups.contains(&category.group.as_str()) {
                groups.push(&category.group);
            }
        }
        groups
    }

    /// Total number of compiled patterns.
    pub fn pattern_count(&self) -> usize {
        self.categories.iter().map(|c| c.patterns.len()).sum()
    }
}

fn compile_category(config: CategoryConfig) -> Result<Category> {
    if config.patterns.is_empty() {
        return Err(Error::Config(format!(
            "category {:?} has no patterns",
            config.name
        )));
    }

    let mut patterns = Vec::with_capacity(config.patterns.len());
    for spec in config.patterns {
        patterns.push(compile_pattern(&config.name, spec)?);
    }

    Ok(Category {
        name: config.name,
        label: config.label,
        group: config.group,
        weight: config.weight,
        color: config.color,
        defense: config.defense,
        patterns,
    })
}

fn compile_pattern(category: &str, spec: PatternSpec) -> Result<CompiledPattern> {
    if spec.source().trim().is_empty() {
        return Err(Error::Config(format!(
            "empty pattern in category {:?}",
            category
        )));
    }

    let source = spec.to_regex_source();
    let regex = RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::pattern(category, spec.source(), e))?;

    // Zero-width matches are dropped by the sweep, so a pattern that can
    // match empty text may shadow its own real alternatives.
    let hir = regex_syntax::parse(&source).map_err(|e| {
        Error::Config(format!(
            "pattern {:?} in category {:?} failed to parse: {}",
            spec.source(),
            category,
            e
        ))
    })?;
    if hir.properties().minimum_len() == Some(0) {
        return Err(Error::Config(format!(
            "pattern {:?} in category {:?} can match the empty string",
            spec.source(),
            category
        )));
    }

    Ok(CompiledPattern { spec, regex })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(patterns: Vec<PatternSpec>) -> LexiconDocument {
        LexiconDocument {
            name: "test".into(),
            version: 1,
            description: String::new(),
            categories: vec![CategoryConfig {
                name: "urgency".into(),
                label: "Urgency".into(),
                group: "pressure".into(),
                weight: 15,
                color: "#ffd700".into(),
                defense: None,
                patterns,
            }],
        }
    }

    #[test]
    fn test_builtin_taxonomies_compile() {
        for taxonomy in Taxonomy::ALL {
            let registry = LexiconRegistry::builtin(taxonomy).unwrap();
            assert_eq!(registry.name(), taxonomy.to_string());
            assert!(registry.pattern_count() > 0);
            assert!(registry.categories().iter().all(|c| c.defense.is_some()));
        }
    }

    #[test]
    fn test_persuasion_weights() {
        let registry = LexiconRegistry::builtin(Taxonomy::PersuasionPressure).unwrap();
        assert_eq!(registry.category("fear_appeal").unwrap().weight, 10);
        assert_eq!(registry.category("urgency").unwrap().weight, 15);
        assert_eq!(registry.category("strawman").unwrap().weight, 20);
        assert_eq!(registry.category("dehumanization").unwrap().weight, 30);
        assert_eq!(
            registry.groups(),
            vec!["emotion", "pressure", "fallacy", "hate"]
        );
    }

    #[test]
    fn test_invalid_regex_fails_at_load() {
        let err = LexiconRegistry::from_document(document(vec![PatternSpec::Regex(
            "(unclosed".into(),
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref category, .. } if category == "urgency"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_matching_pattern_rejected() {
        let err = LexiconRegistry::from_document(document(vec![PatternSpec::Regex("a*".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = LexiconRegistry::from_document(document(vec![PatternSpec::Word("  ".into())]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_patterns_empty_only_in_context_rejected() {
        // `\b|vermin` never matches an empty haystack, yet yields empty spans in text
        for source in [r"\b|vermin", r"(?m)^", r"vermin|$", r"(vermin)?\b"] {
            let err =
                LexiconRegistry::from_document(document(vec![PatternSpec::Regex(source.into())]))
                    .unwrap_err();
            assert!(
                err.to_string().contains("can match the empty string"),
                "{source}: {err}"
            );
        }

        let registry = LexiconRegistry::from_document(document(vec![PatternSpec::Regex(
            r"\bvermin\b".into(),
        )]))
        .unwrap();
        assert_eq!(registry.pattern_count(), 1);
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let mut doc = document(vec![PatternSpec::Word("act now".into())]);
        doc.categories.push(doc.categories[0].clone());
        let err = LexiconRegistry::from_document(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate category"));
    }

    #[test]
    fn test_empty_lexicon_rejected() {
        let mut doc = document(vec![]);
        doc.categories.clear();
        assert!(LexiconRegistry::from_document(doc).is_err());
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = LexiconRegistry::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        let registry =
            LexiconRegistry::from_document(document(vec![PatternSpec::Word("act now".into())]))
                .unwrap();
        let pattern = &registry.categories()[0].patterns[0];
        assert!(pattern.regex.is_match("ACT NOW!"));
        assert!(!pattern.regex.is_match("react nowhere"));
    }
}
