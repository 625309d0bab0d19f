// src/ingest/http.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::parser::parse_feed_items;
use crate::ingest::types::{FeedEndpoint, FeedItem, FeedSource};

pub const USER_AGENT: &str = "prediction-tracker/0.1";

/// Live feed source: one GET, then tolerant parsing of whatever came back.
/// The declared content type is ignored; the body decides.
pub struct HttpFeedSource {
    endpoint: FeedEndpoint,
    http: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new(endpoint: FeedEndpoint) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { endpoint, http }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<Vec<FeedItem>> {
        let resp = self
            .http
            .get(&self.endpoint.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.endpoint.url))?;

        if !resp.status().is_success() {
            anyhow::bail!("{}: HTTP {}", self.endpoint.name, resp.status());
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body from {}", self.endpoint.name))?;
        Ok(parse_feed_items(&body, &self.endpoint.name))
    }

    fn name(&self) -> &str {
        &self.endpoint.name
    }
}
