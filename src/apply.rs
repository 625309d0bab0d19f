// src/apply.rs
//! Validated application of evaluator changes to the dataset.
//! Pure with respect to I/O: the caller persists the dataset afterwards.

use tracing::warn;

use crate::dataset::PredictionDataset;
use crate::evaluator::EvaluationChange;
use crate::resolve::SectionResolver;

/// A change that actually landed, recorded with the canonical section key
/// and the pre-mutation progress value read from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub section_key: String,
    pub prediction: String,
    pub old_progress: u8,
    pub new_progress: u8,
    pub reason: String,
}

/// Apply every resolvable, in-range change.
///
/// An unresolvable section, an unknown prediction title, or an out-of-range
/// progress value skips that one change with a warning; the rest still
/// apply. Evidence is appended only when it carries both a title and a URL,
/// and never twice for the same URL, so re-applying a change is idempotent.
pub fn apply_changes(
    dataset: &mut PredictionDataset,
    resolver: &SectionResolver,
    changes: &[EvaluationChange],
) -> Vec<AppliedChange> {
    let mut applied = Vec::new();

    for change in changes {
        let Some(section_key) = resolver.resolve(&change.section).map(str::to_owned) else {
            warn!(section = %change.section, "unknown section reference, change skipped");
            continue;
        };

        if !(0..=100).contains(&change.new_progress) {
            warn!(
                section = %section_key,
                prediction = %change.prediction,
                new_progress = change.new_progress,
                "proposed progress outside [0,100], change skipped"
            );
            continue;
        }
        let new_progress = change.new_progress as u8;

        let Some(section) = dataset.section_mut(&section_key) else {
            continue;
        };
        // Prediction titles resolve by exact match only.
        let Some(pred) = section
            .predictions
            .iter_mut()
            .find(|p| p.title == change.prediction)
        else {
            warn!(
                section = %section_key,
                prediction = %change.prediction,
                "unknown prediction title, change skipped"
            );
            continue;
        };

        let old_progress = pred.progress;
        pred.progress = new_progress;

        if let Some(evidence) = &change.evidence {
            let citable = !evidence.title.is_empty() && !evidence.url.is_empty();
            if citable && !pred.evidence.iter().any(|e| e.url == evidence.url) {
                pred.evidence.push(evidence.clone());
            }
        }

        applied.push(AppliedChange {
            section_key,
            prediction: pred.title.clone(),
            old_progress,
            new_progress,
            reason: change.reason.clone(),
        });
    }

    applied
}
