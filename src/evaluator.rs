// src/evaluator.rs
//! Evaluator client: prompt construction, the single Messages API call, and
//! strict parsing of the structured reply.
//!
//! The evaluator is consulted exactly once per run, with no retry loop. Its
//! reply is untrusted input: everything in it passes schema validation here
//! and reference/range validation in `apply` before any mutation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dataset::{Evidence, PredictionDataset};
use crate::ingest::types::FeedItem;

/// At most this many articles are quoted in the prompt, keeping the token
/// cost of a busy news fortnight bounded.
pub const MAX_PROMPT_ARTICLES: usize = 80;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// One proposed edit, as returned by the evaluator. `section` and
/// `prediction` are free text until resolved; `new_progress` is untrusted
/// until range-checked. The narrative fields tolerate absence.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EvaluationChange {
    pub section: String,
    pub prediction: String,
    #[serde(default)]
    pub old_progress: Option<i64>,
    pub new_progress: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Evaluation {
    pub changes: Vec<EvaluationChange>,
    pub summary: String,
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Send one evaluation request; returns the raw reply text.
    async fn evaluate(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

const PROMPT_POLICY: &str = r#"## Your Task

Evaluate whether any of the recent articles represent meaningful progress toward any of the predictions. Be CONSERVATIVE:

- Only recommend a progress change if there's clear, concrete evidence (not just speculation or announcements)
- Progress changes should be small: typically 1-3 percentage points
- A single news article rarely justifies more than a 1-2 point change
- If nothing significant happened, say so — no changes is a perfectly valid outcome
- Progress can also go DOWN if evidence suggests setbacks

Respond with ONLY a JSON object in this exact format (no markdown code fences, no other text):

{
  "changes": [
    {
      "section": "biology (use the exact section key shown above)",
      "prediction": "Cancer Treatment (use the exact prediction title shown above)",
      "old_progress": 20,
      "new_progress": 22,
      "reason": "Brief explanation of why",
      "evidence": {
        "title": "Article title",
        "url": "https://...",
        "date": "YYYY-MM-DD"
      }
    }
  ],
  "summary": "One paragraph summary of this evaluation. What did you look at, what was notable even if it didn't warrant a change, and what changed if anything."
}

If no changes are warranted, return: { "changes": [], "summary": "..." }"#;

/// Build the single evaluation request: the full dataset as a readable
/// enumeration, then the candidate articles, then the policy.
pub fn build_prompt(dataset: &PredictionDataset, items: &[FeedItem], window_days: u64) -> String {
    let sections = dataset
        .sections
        .iter()
        .map(|(key, section)| {
            let preds = section
                .predictions
                .iter()
                .map(|p| format!("  - {}: {}% — {}", p.title, p.progress, p.description))
                .collect::<Vec<_>>()
                .join("\n");
            format!("### {} (section key: \"{}\")\n{}", section.title, key, preds)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let articles = items
        .iter()
        .take(MAX_PROMPT_ARTICLES)
        .enumerate()
        .map(|(i, item)| {
            let link = if item.link.is_empty() {
                String::new()
            } else {
                format!(" ({})", item.link)
            };
            format!(
                "{}. [{}] \"{}\" — {}{}",
                i + 1,
                item.source,
                item.title,
                item.description,
                link
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are evaluating progress on predictions from Dario Amodei's \"Machines of Loving Grace\" essay. \
These predictions describe what AI could achieve in 5-10 years after powerful AI is developed.\n\n\
## Current Prediction Progress (as of {last_updated})\n\n{sections}\n\n\
## Recent News Articles (last {window_days} days)\n\n{articles}\n\n{PROMPT_POLICY}",
        last_updated = dataset.last_updated,
    )
}

/// The reply is asked to be bare JSON, but models sometimes wrap it in a
/// Markdown fence anyway. Strip one leading/trailing fence if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json") up to the end of its line.
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
        if let Some(inner) = s.trim_end().strip_suffix("```") {
            s = inner;
        }
    }
    s.trim()
}

/// Parse the reply against the `{changes, summary}` contract. A failure here
/// is a contract violation: the run logs it and exits non-zero without
/// touching the dataset.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, serde_json::Error> {
    serde_json::from_str(strip_code_fences(raw))
}

/// Live client for the Anthropic Messages API.
pub struct ClaudeEvaluator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeEvaluator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::http::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl Evaluator for ClaudeEvaluator {
    async fn evaluate(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(default)]
            text: String,
        }

        let req = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await
            .context("sending evaluation request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("evaluator API error {status}: {body}");
        }

        let body: Resp = resp
            .json()
            .await
            .context("decoding evaluator response envelope")?;
        Ok(body
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Prediction, Section};

    fn dataset() -> PredictionDataset {
        PredictionDataset {
            last_updated: "2025-01-01".to_string(),
            sections: vec![(
                "biology".to_string(),
                Section {
                    title: "Biology and Physical Health".to_string(),
                    description: String::new(),
                    predictions: vec![Prediction {
                        title: "Cancer Treatment".to_string(),
                        description: "Large reduction in cancer mortality".to_string(),
                        progress: 20,
                        evidence: Vec::new(),
                    }],
                },
            )],
        }
    }

    fn item(n: usize) -> FeedItem {
        FeedItem {
            title: format!("Article {n}"),
            link: format!("https://example.org/{n}"),
            description: "desc".to_string(),
            pub_date: String::new(),
            source: "Nature".to_string(),
        }
    }

    #[test]
    fn prompt_enumerates_sections_and_articles() {
        let items = vec![item(1), item(2)];
        let prompt = build_prompt(&dataset(), &items, 14);

        assert!(prompt.contains("### Biology and Physical Health (section key: \"biology\")"));
        assert!(prompt.contains("  - Cancer Treatment: 20% —"));
        assert!(prompt.contains("1. [Nature] \"Article 1\" — desc (https://example.org/1)"));
        assert!(prompt.contains("last 14 days"));
        assert!(prompt.contains("as of 2025-01-01"));
    }

    #[test]
    fn prompt_caps_article_count() {
        let items: Vec<FeedItem> = (0..200).map(item).collect();
        let prompt = build_prompt(&dataset(), &items, 14);
        assert!(prompt.contains(&format!("{MAX_PROMPT_ARTICLES}. [Nature]")));
        assert!(!prompt.contains(&format!("{}. [Nature]", MAX_PROMPT_ARTICLES + 1)));
    }

    #[test]
    fn fences_are_stripped_before_parsing() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```json\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn parses_a_minimal_change() {
        let raw = r#"{
          "changes": [
            { "section": "biology", "prediction": "Cancer Treatment", "new_progress": 22 }
          ],
          "summary": "One notable trial."
        }"#;
        let ev = parse_evaluation(raw).unwrap();
        assert_eq!(ev.changes.len(), 1);
        assert_eq!(ev.changes[0].new_progress, 22);
        assert_eq!(ev.changes[0].reason, "");
        assert!(ev.changes[0].evidence.is_none());
    }

    #[test]
    fn missing_required_fields_violate_the_contract() {
        // No target prediction.
        let raw = r#"{ "changes": [ { "section": "biology", "new_progress": 22 } ], "summary": "s" }"#;
        assert!(parse_evaluation(raw).is_err());
        // No summary.
        assert!(parse_evaluation(r#"{ "changes": [] }"#).is_err());
        // Not JSON at all.
        assert!(parse_evaluation("I think nothing changed this week.").is_err());
    }

    #[test]
    fn empty_change_list_is_a_valid_outcome() {
        let ev = parse_evaluation(r#"```json
{ "changes": [], "summary": "Quiet fortnight." }
```"#)
        .unwrap();
        assert!(ev.changes.is_empty());
        assert_eq!(ev.summary, "Quiet fortnight.");
    }
}
