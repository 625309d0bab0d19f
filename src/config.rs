// src/config.rs
//! Process configuration.
//!
//! Built once at startup and threaded into the pipeline; nothing else reads
//! the environment. All variability is environment-shaped because the
//! scheduler that invokes the binary passes no arguments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ingest::types::FeedEndpoint;

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_DATASET_PATH: &str = "PREDICTIONS_PATH";
pub const ENV_AUDIT_LOG_PATH: &str = "AUDIT_LOG_PATH";
pub const ENV_MODEL: &str = "EVALUATOR_MODEL";
pub const ENV_WINDOW_DAYS: &str = "RECENCY_WINDOW_DAYS";
pub const ENV_FEEDS_PATH: &str = "FEEDS_CONFIG_PATH";

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_WINDOW_DAYS: u64 = 14;
const DEFAULT_DATASET_PATH: &str = "data/predictions.json";
const DEFAULT_AUDIT_LOG_PATH: &str = "AUDIT-LOG.md";
const DEFAULT_FEEDS_FILE: &str = "config/feeds.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY is required")]
    MissingApiKey,
    #[error("reading feed config from {path}")]
    FeedFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing feed config from {path}")]
    FeedFormat {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("RECENCY_WINDOW_DAYS is not a day count: {0:?}")]
    WindowDays(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub dataset_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub window_days: u64,
    pub feeds: Vec<FeedEndpoint>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var(ENV_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let model = env::var(ENV_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let dataset_path = env::var(ENV_DATASET_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATASET_PATH));
        let audit_log_path = env::var(ENV_AUDIT_LOG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG_PATH));
        let window_days = match env::var(ENV_WINDOW_DAYS) {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::WindowDays(raw))?,
            Err(_) => DEFAULT_WINDOW_DAYS,
        };
        let feeds = load_feeds_default()?;

        Ok(Self {
            api_key,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            dataset_path,
            audit_log_path,
            window_days,
            feeds,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FeedsFile {
    feeds: Vec<FeedEndpoint>,
}

/// Load feed endpoints using env var + fallbacks:
/// 1) $FEEDS_CONFIG_PATH
/// 2) config/feeds.toml
/// 3) the built-in default list
pub fn load_feeds_default() -> Result<Vec<FeedEndpoint>, ConfigError> {
    if let Ok(p) = env::var(ENV_FEEDS_PATH) {
        return load_feeds_from(Path::new(&p));
    }
    let fallback = Path::new(DEFAULT_FEEDS_FILE);
    if fallback.exists() {
        return load_feeds_from(fallback);
    }
    Ok(default_feeds())
}

pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedEndpoint>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FeedFile {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: FeedsFile = toml::from_str(&content).map_err(|source| ConfigError::FeedFormat {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parsed.feeds)
}

/// Feeds covering every prediction category.
fn default_feeds() -> Vec<FeedEndpoint> {
    [
        // Biology & Health
        ("Nature", "https://www.nature.com/nature.rss"),
        ("STAT News", "https://www.statnews.com/feed/"),
        ("WHO News", "https://www.who.int/rss-feeds/news-english.xml"),
        // AI & Technology
        ("MIT Technology Review", "https://www.technologyreview.com/feed/"),
        ("Ars Technica Science", "https://feeds.arstechnica.com/arstechnica/science"),
        ("The Verge", "https://www.theverge.com/rss/index.xml"),
        // Economics & Governance
        ("Science Daily", "https://www.sciencedaily.com/rss/top/science.xml"),
        ("UN News", "https://news.un.org/feed/subscribe/en/news/all/rss.xml"),
    ]
    .into_iter()
    .map(|(name, url)| FeedEndpoint {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}
