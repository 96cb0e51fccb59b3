//! Brave web search and the `web_search` tool built on it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, ToolError};
use crate::retry::{with_retry, RetryPolicy};
use crate::tools::{InputSchema, ParamKind, ToolAdapter, ToolDefinition, ToolRegistry};

pub const WEB_SEARCH: &str = "web_search";

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const TOP_HITS: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError>;
}

pub struct BraveSearchClient {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    retry: RetryPolicy,
    client: Client,
}

impl BraveSearchClient {
    pub fn new(api_key: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        if api_key.trim().is_empty() {
            return Err(ClientError::InvalidRequest("Brave API key is required".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;
        Ok(Self {
            api_key: api_key.to_string(),
            endpoint: BRAVE_ENDPOINT.to_string(),
            timeout,
            retry,
            client,
        })
    }

    async fn search_once(&self, query: &str) -> Result<Value, ClientError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout))
    }
}

#[async_trait]
impl SearchApi for BraveSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        debug!("brave search: {}", query);
        let raw = with_retry(
            &self.retry,
            "brave search",
            || self.search_once(query),
            ClientError::is_transient,
        )
        .await?;
        Ok(parse_hits(&raw))
    }
}

/// Top web results, in ranking order.
pub fn parse_hits(raw: &Value) -> Vec<SearchHit> {
    let results = match raw.pointer("/web/results").and_then(|v| v.as_array()) {
        Some(results) => results,
        None => return Vec::new(),
    };
    results
        .iter()
        .filter_map(|r| {
            Some(SearchHit {
                title: r.get("title")?.as_str()?.to_string(),
                url: r.get("url")?.as_str()?.to_string(),
                snippet: r
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .take(TOP_HITS)
        .collect()
}

struct WebSearchTool {
    search: Arc<dyn SearchApi>,
}

#[async_trait]
impl ToolAdapter for WebSearchTool {
    async fn call(&self, args: &Value) -> Result<Value, ClientError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::InvalidRequest("missing argument query".to_string()))?;
        let hits = self.search.search(query).await?;
        Ok(serde_json::json!({ "query": query, "results": hits }))
    }
}

pub fn register(registry: &ToolRegistry, search: Arc<dyn SearchApi>) -> Result<(), ToolError> {
    registry.register(
        ToolDefinition::new(
            WEB_SEARCH,
            "Searches the web and returns the top results with title, url and snippet.",
            InputSchema::new().required("query", ParamKind::Text, "Search query."),
        ),
        Arc::new(WebSearchTool { search }),
    )
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Returns the same hits for every query and records the queries.
    #[derive(Default)]
    pub struct FakeSearch {
        pub hits: Vec<SearchHit>,
        pub queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchApi for FakeSearch {
        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.clone())
        }
    }
}
