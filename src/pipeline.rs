// src/pipeline.rs
//! One reconciliation run, end to end.
//!
//! The caller supplies the feed sources and the evaluator, so the whole
//! pipeline runs offline in tests. Whatever happens after startup, exactly
//! one audit entry is appended before this module returns.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::apply::{apply_changes, AppliedChange};
use crate::audit;
use crate::config::Config;
use crate::dataset::PredictionDataset;
use crate::evaluator::{build_prompt, parse_evaluation, Evaluator};
use crate::ingest::types::FeedSource;
use crate::ingest::{fetch_all, filter_recent};
use crate::resolve::SectionResolver;

/// Fixed audit messages for runs that never reached a usable evaluation.
pub const NO_ITEMS_SUMMARY: &str =
    "No recent articles found from any feed. Feeds may be down.";
pub const TRANSPORT_FAILURE_SUMMARY: &str =
    "Error: evaluator request failed; no changes were considered.";
pub const PARSE_FAILURE_SUMMARY: &str =
    "Error: could not parse the evaluator response.";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The reply text did not match the `{changes, summary}` contract.
    /// The dataset is untouched; an audit entry has been written.
    #[error("evaluator response did not match the expected JSON shape: {0}")]
    EvaluationContract(#[source] serde_json::Error),
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct RunOutcome {
    pub date: String,
    pub articles_scanned: usize,
    pub applied: Vec<AppliedChange>,
    pub summary: String,
    pub dataset_written: bool,
}

/// Run once against the current wall clock.
pub async fn run(
    cfg: &Config,
    sources: &[Arc<dyn FeedSource>],
    evaluator: &dyn Evaluator,
) -> Result<RunOutcome, PipelineError> {
    let now = chrono::Utc::now();
    let today = now.format("%Y-%m-%d").to_string();
    run_at(cfg, sources, evaluator, &today, now.timestamp()).await
}

/// Run once at an explicit instant. `today` stamps the dataset and the audit
/// entry; `now_unix` anchors the recency window.
pub async fn run_at(
    cfg: &Config,
    sources: &[Arc<dyn FeedSource>],
    evaluator: &dyn Evaluator,
    today: &str,
    now_unix: i64,
) -> Result<RunOutcome, PipelineError> {
    let mut dataset = PredictionDataset::load(&cfg.dataset_path)?;
    info!(sections = dataset.sections.len(), "dataset loaded");

    let all_items = fetch_all(sources).await;
    let total = all_items.len();
    let recent = filter_recent(all_items, now_unix, cfg.window_days);
    info!(
        recent = recent.len(),
        total,
        window_days = cfg.window_days,
        "feed items filtered"
    );

    if recent.is_empty() {
        audit::append_run_entry(&cfg.audit_log_path, &dataset, today, 0, &[], NO_ITEMS_SUMMARY)?;
        return Ok(RunOutcome {
            date: today.to_string(),
            articles_scanned: 0,
            applied: Vec::new(),
            summary: NO_ITEMS_SUMMARY.to_string(),
            dataset_written: false,
        });
    }

    let prompt = build_prompt(&dataset, &recent, cfg.window_days);
    let reply = match evaluator.evaluate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            audit::append_run_entry(
                &cfg.audit_log_path,
                &dataset,
                today,
                recent.len(),
                &[],
                TRANSPORT_FAILURE_SUMMARY,
            )?;
            return Err(PipelineError::Fatal(e.context("evaluator request failed")));
        }
    };

    let evaluation = match parse_evaluation(&reply) {
        Ok(evaluation) => evaluation,
        Err(e) => {
            warn!(reply = %head(&reply), "unparseable evaluator reply");
            audit::append_run_entry(
                &cfg.audit_log_path,
                &dataset,
                today,
                recent.len(),
                &[],
                PARSE_FAILURE_SUMMARY,
            )?;
            return Err(PipelineError::EvaluationContract(e));
        }
    };
    info!(proposed = evaluation.changes.len(), "evaluation received");

    let resolver = SectionResolver::from_dataset(&dataset);
    let applied = apply_changes(&mut dataset, &resolver, &evaluation.changes);

    let dataset_written = if applied.is_empty() {
        info!("no changes to apply");
        false
    } else {
        dataset.last_updated = today.to_string();
        dataset.save(&cfg.dataset_path)?;
        info!(applied = applied.len(), "dataset updated");
        true
    };

    audit::append_run_entry(
        &cfg.audit_log_path,
        &dataset,
        today,
        recent.len(),
        &applied,
        &evaluation.summary,
    )?;

    Ok(RunOutcome {
        date: today.to_string(),
        articles_scanned: recent.len(),
        applied,
        summary: evaluation.summary,
        dataset_written,
    })
}

fn head(s: &str) -> String {
    s.chars().take(500).collect()
}
