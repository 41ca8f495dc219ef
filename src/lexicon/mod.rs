//! Lexicon/pattern registry.
//!
//! Categories of manipulative rhetoric live in versioned JSON documents, one per
//! taxonomy. A document is compiled once into a [`LexiconRegistry`]; every
//! malformed pattern is reported at that point, never during a scan.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shield_core::lexicon::{LexiconRegistry, Taxonomy};
//!
//! let registry = LexiconRegistry::builtin(Taxonomy::PersuasionPressure)?;
//! for category in registry.categories() {
//!     println!("{} ({} pts/hit)", category.label, category.weight);
//! }
//! ```

mod registry;
mod types;

pub use registry::LexiconRegistry;
pub use types::{
    Category, CategoryConfig, CompiledPattern, LexiconDocument, PatternSpec, Taxonomy,
};
