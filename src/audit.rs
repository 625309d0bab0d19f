// src/audit.rs
//! Append-only run log.
//!
//! Entries are Markdown, newest first after a fixed header block. The
//! insertion itself is a pure text transformation (existing log + entry →
//! new log) so it is testable without touching a filesystem; the file write
//! is a thin wrapper. Prior entries are preserved verbatim.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::apply::AppliedChange;
use crate::dataset::PredictionDataset;

/// Synthesized when the log file does not exist yet.
pub const DEFAULT_HEADER: &str = "# Prediction Audit Log\n\n\
Automated evaluation of AI progress predictions.\n\
Each entry shows what was scanned, what changed, and why.\n";

/// Render one dated run record.
pub fn render_entry(
    date: &str,
    articles_scanned: usize,
    mean_progress: f64,
    changes: &[AppliedChange],
    summary: &str,
) -> String {
    let mut entry = format!("\n## {date}\n\n");
    entry.push_str(&format!(
        "**Articles scanned:** {articles_scanned} | **Overall progress:** {mean_progress:.1}%\n\n"
    ));

    if changes.is_empty() {
        entry.push_str("**No changes this run.**\n\n");
    } else {
        entry.push_str("**Changes:**\n");
        for c in changes {
            entry.push_str(&format!(
                "- **{}** ({}): {}% → {}% — {}\n",
                c.prediction, c.section_key, c.old_progress, c.new_progress, c.reason
            ));
        }
        entry.push('\n');
    }

    entry.push_str(&format!("**Summary:** {summary}\n"));
    entry
}

/// Insert `entry` directly after the header block, before the newest
/// existing entry. A log without any `## ` delimiter gets the entry
/// appended at the end instead.
pub fn insert_entry(log: &str, entry: &str) -> String {
    match log.find("\n## ") {
        Some(idx) => {
            let mut out = String::with_capacity(log.len() + entry.len());
            out.push_str(&log[..idx]);
            out.push_str(entry);
            out.push_str(&log[idx..]);
            out
        }
        None => format!("{log}{entry}"),
    }
}

/// Append one run record to the log file, creating it with the default
/// header when missing. Called exactly once per run, on every outcome.
pub fn append_run_entry(
    path: &Path,
    dataset: &PredictionDataset,
    date: &str,
    articles_scanned: usize,
    changes: &[AppliedChange],
    summary: &str,
) -> Result<()> {
    let log = match fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(_) => DEFAULT_HEADER.to_string(),
    };
    let entry = render_entry(
        date,
        articles_scanned,
        dataset.mean_progress(),
        changes,
        summary,
    );
    let updated = insert_entry(&log, &entry);
    fs::write(path, updated).with_context(|| format!("writing audit log to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_change() -> AppliedChange {
        AppliedChange {
            section_key: "economics".to_string(),
            prediction: "Economic Growth".to_string(),
            old_progress: 5,
            new_progress: 7,
            reason: "IMF revised projections upward".to_string(),
        }
    }

    #[test]
    fn entry_lists_changes_with_old_and_new_values() {
        let entry = render_entry("2025-01-20", 42, 18.25, &[sample_change()], "One change.");
        assert!(entry.starts_with("\n## 2025-01-20\n"));
        assert!(entry.contains("**Articles scanned:** 42 | **Overall progress:** 18.2%"));
        assert!(entry.contains("- **Economic Growth** (economics): 5% → 7% — IMF revised projections upward"));
        assert!(entry.ends_with("**Summary:** One change.\n"));
    }

    #[test]
    fn entry_marks_a_run_without_changes() {
        let entry = render_entry("2025-01-20", 0, 20.0, &[], "Nothing moved.");
        assert!(entry.contains("**No changes this run.**"));
        assert!(!entry.contains("**Changes:**"));
    }

    #[test]
    fn mean_is_formatted_to_one_decimal() {
        let entry = render_entry("2025-01-20", 1, 33.333_333, &[], "s");
        assert!(entry.contains("33.3%"));
    }

    #[test]
    fn new_entries_land_after_the_header_newest_first() {
        let log = insert_entry(DEFAULT_HEADER, "\n## 2025-01-13\n\nfirst\n");
        let log = insert_entry(&log, "\n## 2025-01-20\n\nsecond\n");

        let newest = log.find("## 2025-01-20").unwrap();
        let older = log.find("## 2025-01-13").unwrap();
        assert!(newest < older, "newest entry must come first");
        assert!(log.starts_with(DEFAULT_HEADER.trim_end_matches('\n')));
        // Both entries preserved verbatim.
        assert!(log.contains("first"));
        assert!(log.contains("second"));
    }

    #[test]
    fn log_without_delimiter_gets_entry_appended() {
        let log = insert_entry("# Fresh Log\n", "\n## 2025-01-20\n\nentry\n");
        assert_eq!(log, "# Fresh Log\n\n## 2025-01-20\n\nentry\n");
    }
}
