use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use super::types::{ToolAdapter, ToolCall, ToolDefinition, ToolEntry, ToolResult, ToolSchema};
use crate::error::{ClientError, ToolError};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(45);

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolEntry>>,
    call_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_call_timeout(DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_call_timeout(call_timeout: Duration) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            call_timeout,
        }
    }

    pub fn register(&self, definition: ToolDefinition, adapter: Arc<dyn ToolAdapter>) -> Result<(), ToolError> {
        if definition.name.trim().is_empty() {
            return Err(ToolError::Registration("tool name must not be empty".to_string()));
        }
        let mut map = self
            .tools
            .write()
            .map_err(|_| ToolError::Registration("lock error".to_string()))?;
        if map.contains_key(&definition.name) {
            return Err(ToolError::Registration(format!(
                "tool already registered: {}",
                definition.name
            )));
        }
        map.insert(definition.name.clone(), ToolEntry { definition, adapter });
        Ok(())
    }

    /// Validates and runs one call. Unknown names and schema violations never
    /// reach the adapter.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let adapter = {
            let map = self
                .tools
                .read()
                .map_err(|_| ToolError::Registration("lock error".to_string()))?;
            let entry = map
                .get(&call.name)
                .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
            entry
                .definition
                .input
                .validate(&call.args)
                .map_err(|reason| ToolError::schema(&call.name, reason))?;
            entry.adapter.clone()
        };

        debug!("invoking tool {} with {}", call.name, call.args);
        match tokio::time::timeout(self.call_timeout, adapter.call(&call.args)).await {
            Ok(Ok(output)) => Ok(ToolResult::ok(&call.name, output)),
            Ok(Err(err)) => Err(ToolError::execution(&call.name, err)),
            Err(_) => Err(ToolError::execution(
                &call.name,
                ClientError::Timeout(self.call_timeout),
            )),
        }
    }

    /// Schemas for every registered tool, sorted by name.
    pub fn get_schemas(&self) -> Vec<ToolSchema> {
        let map = match self.tools.read() {
            Ok(lock) => lock,
            Err(_) => return vec![],
        };
        let mut schemas: Vec<ToolSchema> = map.values().map(|entry| entry.definition.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn has(&self, name: &str) -> bool {
        match self.tools.read() {
            Ok(map) => map.contains_key(name),
            Err(_) => false,
        }
    }

    pub fn count(&self) -> usize {
        match self.tools.read() {
            Ok(map) => map.len(),
            Err(_) => 0,
        }
    }
}
