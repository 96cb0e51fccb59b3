use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::cache::ResponseCache;
use super::client::SportsFeeds;
use super::{nba, nfl, odds};
use crate::error::{ClientError, ToolError};
use crate::search::{self, SearchApi};
use crate::tools::{InputSchema, ToolAdapter, ToolDefinition, ToolRegistry};

pub const CLEAR_CACHES: &str = "clear_caches";

struct ClearCachesTool {
    cache: Arc<ResponseCache>,
}

#[async_trait]
impl ToolAdapter for ClearCachesTool {
    async fn call(&self, _args: &Value) -> Result<Value, ClientError> {
        let cleared = self.cache.clear();
        info!("cleared {} cached responses", cleared);
        Ok(json!({ "status": "ok", "cleared": cleared }))
    }
}

/// Every tool the sports agent can call.
pub fn sports_registry(
    feeds: &SportsFeeds,
    cache: Arc<ResponseCache>,
    search: Arc<dyn SearchApi>,
    call_timeout: Duration,
) -> Result<ToolRegistry, ToolError> {
    let registry = ToolRegistry::with_call_timeout(call_timeout);
    nfl::register(&registry, feeds.nfl.clone(), cache.clone())?;
    nba::register(&registry, feeds.nba.clone(), cache.clone())?;
    odds::register(&registry, feeds.odds.clone(), cache.clone())?;
    search::register(&registry, search)?;
    registry.register(
        ToolDefinition::new(
            CLEAR_CACHES,
            "Clears cached schedules and team lists so the next lookup hits the provider.",
            InputSchema::new(),
        ),
        Arc::new(ClearCachesTool { cache }),
    )?;
    Ok(registry)
}

/// The research agent only searches the web.
pub fn research_registry(search: Arc<dyn SearchApi>, call_timeout: Duration) -> Result<ToolRegistry, ToolError> {
    let registry = ToolRegistry::with_call_timeout(call_timeout);
    search::register(&registry, search)?;
    Ok(registry)
}
