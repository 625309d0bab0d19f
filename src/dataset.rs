// src/dataset.rs
//! The persisted prediction dataset: typed shape, ordered load, whole-file save.
//!
//! On disk the dataset is one JSON object: `lastUpdated` plus one key per
//! section. Section order in the file only matters for diffs, but it must
//! survive a read→mutate→write cycle, so the load/save path goes through
//! `serde_json`'s order-preserving map instead of a keyed derive.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A citation supporting a specific progress value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    pub title: String,
    pub url: String,
    pub date: String,
}

/// A single tracked claim. `title` doubles as the identifier within its
/// section, so it must stay unique there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    pub title: String,
    pub description: String,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub description: String,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionDataset {
    /// ISO day of the most recent applied change.
    pub last_updated: String,
    /// Sections in file order, keyed by their stable section key.
    pub sections: Vec<(String, Section)>,
}

impl PredictionDataset {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text).context("dataset is not valid JSON")?;
        let obj = root
            .as_object()
            .context("dataset root must be a JSON object")?;

        let mut last_updated = String::new();
        let mut sections = Vec::new();
        for (key, value) in obj {
            if key == "lastUpdated" {
                last_updated = value.as_str().unwrap_or_default().to_string();
                continue;
            }
            let section: Section = serde_json::from_value(value.clone())
                .with_context(|| format!("section {key:?} has an unexpected shape"))?;
            sections.push((key.clone(), section));
        }

        Ok(Self {
            last_updated,
            sections,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading dataset from {}", path.display()))?;
        Self::parse(&text)
    }

    /// Pretty-printed JSON, trailing newline included, sections in the order
    /// they were loaded.
    pub fn to_json(&self) -> Result<String> {
        let mut obj = Map::new();
        obj.insert(
            "lastUpdated".to_string(),
            Value::String(self.last_updated.clone()),
        );
        for (key, section) in &self.sections {
            obj.insert(key.clone(), serde_json::to_value(section)?);
        }
        let mut text = serde_json::to_string_pretty(&Value::Object(obj))?;
        text.push('\n');
        Ok(text)
    }

    /// Rewrites the dataset file in full; there is no partial or merge write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_json()?;
        fs::write(path, text).with_context(|| format!("writing dataset to {}", path.display()))
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s)
    }

    pub fn section_mut(&mut self, key: &str) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s)
    }

    /// Arithmetic mean of `progress` across every prediction, 0 when empty.
    pub fn mean_progress(&self) -> f64 {
        let mut total = 0u64;
        let mut count = 0u64;
        for (_, section) in &self.sections {
            for pred in &section.predictions {
                total += u64::from(pred.progress);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
  "lastUpdated": "2025-01-01",
  "neuroscience": {
    "title": "Neuroscience and Mind",
    "description": "Mental health and cognition",
    "predictions": [
      { "title": "Depression Treatment", "description": "Effective treatment for most depression", "progress": 20 }
    ]
  },
  "biology": {
    "title": "Biology and Physical Health",
    "description": "Disease and lifespan",
    "predictions": [
      {
        "title": "Cancer Treatment",
        "description": "Large reduction in cancer mortality",
        "progress": 20,
        "evidence": [
          { "title": "Trial result", "url": "https://example.org/a", "date": "2024-12-01" }
        ]
      }
    ]
  }
}
"#;

    #[test]
    fn parse_keeps_file_order_and_defaults_evidence() {
        let ds = PredictionDataset::parse(FIXTURE).unwrap();
        assert_eq!(ds.last_updated, "2025-01-01");
        // "neuroscience" precedes "biology" in the file and must stay first.
        assert_eq!(ds.sections[0].0, "neuroscience");
        assert_eq!(ds.sections[1].0, "biology");
        assert!(ds.sections[0].1.predictions[0].evidence.is_empty());
        assert_eq!(ds.sections[1].1.predictions[0].evidence.len(), 1);
    }

    #[test]
    fn to_json_round_trips_and_ends_with_newline() {
        let ds = PredictionDataset::parse(FIXTURE).unwrap();
        let text = ds.to_json().unwrap();
        assert!(text.ends_with('\n'));
        let again = PredictionDataset::parse(&text).unwrap();
        assert_eq!(ds, again);
        // Section order survives the rewrite.
        assert!(text.find("neuroscience").unwrap() < text.find("\"biology\"").unwrap());
    }

    #[test]
    fn predictions_without_evidence_serialize_without_the_field() {
        let ds = PredictionDataset::parse(FIXTURE).unwrap();
        let text = ds.to_json().unwrap();
        let neuro_block = &text[text.find("neuroscience").unwrap()..text.find("\"biology\"").unwrap()];
        assert!(!neuro_block.contains("evidence"));
    }

    #[test]
    fn mean_progress_is_a_simple_average() {
        let mut ds = PredictionDataset::parse(FIXTURE).unwrap();
        assert!((ds.mean_progress() - 20.0).abs() < 1e-9);
        ds.section_mut("biology").unwrap().predictions[0].progress = 41;
        assert!((ds.mean_progress() - 30.5).abs() < 1e-9);

        let empty = PredictionDataset {
            last_updated: String::new(),
            sections: Vec::new(),
        };
        assert_eq!(empty.mean_progress(), 0.0);
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(PredictionDataset::parse("[1, 2, 3]").is_err());
        assert!(PredictionDataset::parse("not json").is_err());
    }
}
