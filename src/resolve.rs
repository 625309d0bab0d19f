// src/resolve.rs
//! Section reference resolution.
//!
//! The evaluator is shown canonical section keys and titles but echoes them
//! back with drifted case and punctuation. Resolution is a fixed
//! normalization plus exact table lookup; anything fuzzier (substring or
//! similarity scoring) would make run behavior non-deterministic.

use std::collections::HashMap;

use crate::dataset::PredictionDataset;

/// Lowercase, ASCII letters only:
/// `"Biology And Physical Health"` → `"biologyandphysicalhealth"`.
pub fn normalize_reference(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            let c = c.to_ascii_lowercase();
            c.is_ascii_lowercase().then_some(c)
        })
        .collect()
}

/// Static lookup tables built once per run from the canonical keys and
/// titles; `resolve` is a pure lookup after that.
#[derive(Debug)]
pub struct SectionResolver {
    table: HashMap<String, String>,
}

impl SectionResolver {
    pub fn from_dataset(dataset: &PredictionDataset) -> Self {
        let mut table = HashMap::new();
        for (key, section) in &dataset.sections {
            table.insert(normalize_reference(key), key.clone());
            table.insert(normalize_reference(&section.title), key.clone());
        }
        Self { table }
    }

    /// Map a free-text section reference to its canonical key.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        self.table
            .get(&normalize_reference(reference))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Section;

    fn dataset() -> PredictionDataset {
        PredictionDataset {
            last_updated: "2025-01-01".to_string(),
            sections: vec![(
                "biology".to_string(),
                Section {
                    title: "Biology and Physical Health".to_string(),
                    description: String::new(),
                    predictions: Vec::new(),
                },
            )],
        }
    }

    #[test]
    fn normalization_drops_case_and_punctuation() {
        assert_eq!(normalize_reference("Biology And Physical Health"), "biologyandphysicalhealth");
        assert_eq!(normalize_reference("bio-logy!"), "biology");
        assert_eq!(normalize_reference("42"), "");
    }

    #[test]
    fn resolves_by_key_and_by_title_despite_drift() {
        let resolver = SectionResolver::from_dataset(&dataset());
        assert_eq!(resolver.resolve("biology"), Some("biology"));
        assert_eq!(resolver.resolve("Biology."), Some("biology"));
        assert_eq!(resolver.resolve("Biology And Physical Health"), Some("biology"));
        assert_eq!(resolver.resolve("biology-and-physical-health"), Some("biology"));
    }

    #[test]
    fn unknown_references_do_not_resolve() {
        let resolver = SectionResolver::from_dataset(&dataset());
        assert_eq!(resolver.resolve("unknown-xyz"), None);
        assert_eq!(resolver.resolve("physics"), None);
    }
}
