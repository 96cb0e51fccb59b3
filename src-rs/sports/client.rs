use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::cache::ResponseCache;
use crate::error::ClientError;
use crate::retry::{with_retry, RetryPolicy};

/// A JSON GET endpoint family of the sports provider.
#[async_trait]
pub trait SportsFeed: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> Result<Value, ClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum League {
    Nfl,
    Nba,
    Odds,
}

impl League {
    pub fn base_url(&self, access_level: &str) -> String {
        match self {
            League::Nfl => format!("https://api.sportradar.com/nfl/official/{}/v7/en", access_level),
            League::Nba => format!("https://api.sportradar.com/nba/{}/v8/en", access_level),
            League::Odds => format!(
                "https://api.sportradar.com/oddscomparison-prematch/{}/v2/en",
                access_level
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            League::Nfl => "nfl",
            League::Nba => "nba",
            League::Odds => "odds",
        }
    }
}

pub struct SportradarClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    client: Client,
}

impl SportradarClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        if api_key.trim().is_empty() {
            return Err(ClientError::InvalidRequest("Sportradar API key is required".to_string()));
        }
        if base_url.trim().is_empty() {
            return Err(ClientError::InvalidRequest("base URL is required".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(err.to_string()))?;
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry,
            client,
        })
    }

    pub fn for_league(
        league: League,
        api_key: &str,
        access_level: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        Self::new(api_key, &league.base_url(access_level), timeout, retry)
    }

    async fn fetch_once(&self, endpoint: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_matches('/'));
        let resp = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
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
        let data: Value = resp
            .json()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout))?;
        check_provider_error(&data)?;
        Ok(data)
    }
}

#[async_trait]
impl SportsFeed for SportradarClient {
    async fn fetch(&self, endpoint: &str) -> Result<Value, ClientError> {
        debug!("sportradar GET {}", endpoint);
        with_retry(
            &self.retry,
            endpoint,
            || self.fetch_once(endpoint),
            ClientError::is_transient,
        )
        .await
    }
}

/// Sportradar sometimes answers 200 with an error document.
fn check_provider_error(data: &Value) -> Result<(), ClientError> {
    let code = data.get("code").and_then(|v| v.as_i64());
    let message = data.get("message").and_then(|v| v.as_str());
    match (code, message) {
        (Some(code), Some(message)) if code != 200 => Err(ClientError::Provider {
            code,
            message: message.to_string(),
        }),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct SportsFeeds {
    pub nfl: Arc<dyn SportsFeed>,
    pub nba: Arc<dyn SportsFeed>,
    pub odds: Arc<dyn SportsFeed>,
}

impl SportsFeeds {
    pub fn sportradar(api_key: &str, access_level: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ClientError> {
        let build = |league| -> Result<Arc<dyn SportsFeed>, ClientError> {
            Ok(Arc::new(SportradarClient::for_league(
                league,
                api_key,
                access_level,
                timeout,
                retry.clone(),
            )?))
        };
        Ok(Self {
            nfl: build(League::Nfl)?,
            nba: build(League::Nba)?,
            odds: build(League::Odds)?,
        })
    }
}

/// Serves `endpoint` from `cache` when fresh, otherwise fetches and stores it.
pub async fn fetch_cached(
    feed: &dyn SportsFeed,
    cache: &ResponseCache,
    league: League,
    endpoint: &str,
    ttl: Duration,
) -> Result<Value, ClientError> {
    if let Some(hit) = cache.get(league, endpoint) {
        debug!(league = league.label(), endpoint, "cache hit");
        return Ok(hit);
    }
    let value = feed.fetch(endpoint).await?;
    cache.insert(league, endpoint, value.clone(), ttl);
    Ok(value)
}

pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ClientError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .ok_or_else(|| ClientError::InvalidRequest(format!("missing argument {}", key)))
}

pub(crate) fn arg_i64(args: &Value, key: &str) -> Result<i64, ClientError> {
    args.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ClientError::InvalidRequest(format!("missing argument {}", key)))
}

pub(crate) fn arg_id(args: &Value, key: &str) -> Result<String, ClientError> {
    args.get(key)
        .and_then(crate::tools::canonical_id)
        .ok_or_else(|| ClientError::InvalidRequest(format!("missing argument {}", key)))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by endpoint; records every request.
    #[derive(Default)]
    pub struct FakeFeed {
        responses: Mutex<HashMap<String, Result<Value, ClientError>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeFeed {
        pub fn with(self, endpoint: &str, response: Result<Value, ClientError>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(endpoint.to_string(), response);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SportsFeed for FakeFeed {
        async fn fetch(&self, endpoint: &str) -> Result<Value, ClientError> {
            self.requests.lock().unwrap().push(endpoint.to_string());
            self.responses
                .lock()
                .unwrap()
                .get(endpoint)
                .cloned()
                .unwrap_or_else(|| Err(ClientError::Http { status: 404, body: endpoint.to_string() }))
        }
    }
}
