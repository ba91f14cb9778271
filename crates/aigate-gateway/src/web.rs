//! Web search: used for grounding when internal content has nothing.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use aigate_core::config::schema::WebSearchConfig;

/// Public Brave Search endpoint.
const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave caps `count` at 20.
const MAX_COUNT: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `limit` results for `query`.
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

// ─────────────────────────────────────────────
// BraveSearch
// ─────────────────────────────────────────────

/// Searches the web using the Brave Search API.
///
/// Without an API key every search returns no results.
pub struct BraveSearch {
    api_key: Option<String>,
    endpoint: String,
    client: Client,
}

impl BraveSearch {
    pub fn new(config: &WebSearchConfig, timeout: Duration) -> anyhow::Result<Self> {
        let api_key = Some(config.api_key.trim().to_string()).filter(|k| !k.is_empty());
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build web search HTTP client")?;
        Ok(Self {
            api_key,
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| BRAVE_ENDPOINT.to_string()),
            client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl WebSearch for BraveSearch {
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("no Brave API key configured, skipping web search");
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        let count = limit.min(MAX_COUNT).to_string();

        debug!(query = %query, count = %count, "searching web");

        let resp = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Brave API request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Brave API returned {status}");
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Brave response: {e}"))?;

        let results = body["web"]["results"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(results
            .iter()
            .filter_map(|r| {
                let url = r["url"].as_str()?.to_string();
                Some(SearchHit {
                    title: r["title"].as_str().unwrap_or("(no title)").to_string(),
                    url,
                    snippet: r["description"].as_str().unwrap_or("").to_string(),
                })
            })
            .take(limit)
            .collect())
    }
}
