// src/ingest/types.rs
use anyhow::Result;

/// One normalized news item, as extracted from a feed body. Only `title` is
/// guaranteed non-empty; every other field defaults to "" when the source
/// markup lacks it.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw timestamp text exactly as published; parsed lazily at filter time.
    pub pub_date: String,
    pub source: String,
}

/// A configured feed endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FeedEndpoint {
    pub name: String, // e.g., "Nature", "The Verge"
    pub url: String,
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<FeedItem>>;
    fn name(&self) -> &str;
}
