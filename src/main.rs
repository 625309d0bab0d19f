//! Prediction Tracker — Binary Entrypoint
//! One reconciliation run per invocation: fetch feeds, consult the
//! evaluator, apply validated changes, append the audit entry, exit.
//! Scheduling and mutual exclusion belong to the caller's scheduler.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prediction_tracker::config::Config;
use prediction_tracker::evaluator::ClaudeEvaluator;
use prediction_tracker::ingest::http::HttpFeedSource;
use prediction_tracker::ingest::types::FeedSource;
use prediction_tracker::pipeline::{self, PipelineError};

/// Unusable startup configuration (missing credential, bad feed file).
const EXIT_CONFIG: u8 = 2;
/// Evaluator reply violated the response contract.
const EXIT_CONTRACT: u8 = 3;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in scheduled environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "startup configuration is unusable");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let sources: Vec<Arc<dyn FeedSource>> = cfg
        .feeds
        .iter()
        .cloned()
        .map(|endpoint| Arc::new(HttpFeedSource::new(endpoint)) as Arc<dyn FeedSource>)
        .collect();
    let evaluator = ClaudeEvaluator::new(&cfg.api_key, &cfg.model, cfg.max_tokens);

    match pipeline::run(&cfg, &sources, &evaluator).await {
        Ok(outcome) => {
            tracing::info!(
                date = %outcome.date,
                scanned = outcome.articles_scanned,
                applied = outcome.applied.len(),
                dataset_written = outcome.dataset_written,
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(PipelineError::EvaluationContract(e)) => {
            tracing::error!(error = %e, "evaluator reply violated the response contract");
            ExitCode::from(EXIT_CONTRACT)
        }
        Err(PipelineError::Fatal(e)) => {
            tracing::error!(error = ?e, "fatal error");
            ExitCode::FAILURE
        }
    }
}
