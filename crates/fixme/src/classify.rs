//! Heuristic issue classification from labels and free text.
//!
//! Everything here is pure and synchronous. The [`Classifier`] bundles a
//! [`TechnologyVocabulary`] so the alias table can be swapped without
//! touching the label-scanning logic.
//!
//! # Example
//!
//! ```
//! use fixme::classify::Classifier;
//! use fixme::entity::prelude::ExperienceTier;
//!
//! let classifier = Classifier::builtin();
//! let labels = vec!["Good First Issue".to_string(), "bug".to_string()];
//! assert_eq!(classifier.difficulty(&labels), ExperienceTier::Easy);
//!
//! let tech = classifier.technologies("I love React.js and NodeJS");
//! assert!(tech.contains("React") && tech.contains("Node"));
//! ```

mod labels;
mod technologies;

use std::collections::BTreeSet;

use crate::entity::experience_tier::ExperienceTier;
use crate::entity::issue_type::IssueType;

pub use labels::{classify_difficulty, classify_type, label_tokens};
pub use technologies::{BuiltinTechnologies, TechnologyVocabulary, extract_technologies};

/// Label and text classifier parameterized over a technology vocabulary.
#[derive(Debug, Clone, Default)]
pub struct Classifier<V = BuiltinTechnologies> {
    vocabulary: V,
}

impl Classifier<BuiltinTechnologies> {
    /// Classifier backed by the built-in technology table.
    pub fn builtin() -> Self {
        Self::new(BuiltinTechnologies)
    }
}

impl<V: TechnologyVocabulary> Classifier<V> {
    pub fn new(vocabulary: V) -> Self {
        Self { vocabulary }
    }

    /// See [`classify_difficulty`].
    pub fn difficulty(&self, labels: &[String]) -> ExperienceTier {
        classify_difficulty(labels)
    }

    /// See [`classify_type`].
    pub fn issue_type(&self, labels: &[String]) -> Option<IssueType> {
        classify_type(labels)
    }

    /// Technologies mentioned in `text`, by canonical name.
    pub fn technologies(&self, text: &str) -> BTreeSet<String> {
        extract_technologies(&self.vocabulary, text)
    }
}
