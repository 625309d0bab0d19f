// src/ingest/mod.rs
pub mod http;
pub mod parser;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::ingest::types::{FeedItem, FeedSource};

/// Hard per-feed deadline. A feed slower than this is treated like a failed one.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetch every source concurrently and merge whatever succeeded.
///
/// One feed's outage, garbage body, or timeout never affects the others:
/// failures surface as a warning line and contribute zero items. Merge order
/// follows task completion and carries no meaning.
pub async fn fetch_all(sources: &[Arc<dyn FeedSource>]) -> Vec<FeedItem> {
    let mut set = JoinSet::new();
    for source in sources {
        let source = Arc::clone(source);
        set.spawn(async move {
            let name = source.name().to_string();
            match tokio::time::timeout(FETCH_TIMEOUT, source.fetch()).await {
                Ok(Ok(items)) => {
                    info!(feed = %name, items = items.len(), "feed fetched");
                    items
                }
                Ok(Err(e)) => {
                    warn!(feed = %name, error = ?e, "feed failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(feed = %name, "feed timed out");
                    Vec::new()
                }
            }
        });
    }

    let mut merged = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(items) => merged.extend(items),
            Err(e) => warn!(error = ?e, "feed task panicked"),
        }
    }
    merged
}

/// Feeds publish RFC 2822 (`pubDate`) or RFC 3339 (`published`/`updated`).
fn parse_feed_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .ok()
        .map(OffsetDateTime::unix_timestamp)
}

/// Keep items published within the trailing window ending at `now_unix`.
///
/// Items whose timestamp is missing or unparseable are kept: an undateable
/// article may still be relevant, and dropping it silently would be worse
/// than letting the evaluator see it.
pub fn filter_recent(items: Vec<FeedItem>, now_unix: i64, window_days: u64) -> Vec<FeedItem> {
    let cutoff = now_unix - (window_days as i64) * 86_400;
    items
        .into_iter()
        .filter(|item| match parse_feed_timestamp(&item.pub_date) {
            Some(ts) => ts >= cutoff && ts <= now_unix,
            None => true,
        })
        .collect()
}
