use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::InputSchema;
use crate::error::ClientError;

/// LLM-facing rendering of a tool: name, description and JSON schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input: InputSchema,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, input: InputSchema) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input,
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: Some(self.input.to_json_schema()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: &str, args: Value) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }

    /// Canonical string form of an identifier-like argument.
    pub fn identifier_arg(&self, key: &str) -> Option<String> {
        self.args.get(key).and_then(canonical_id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool: &str, output: Value) -> Self {
        Self {
            tool: tool.to_string(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(tool: &str, error: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A callable tool backed by one of the external clients.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    async fn call(&self, args: &Value) -> Result<Value, ClientError>;
}

pub struct ToolEntry {
    pub definition: ToolDefinition,
    pub adapter: Arc<dyn ToolAdapter>,
}

/// Strings are used as-is, integers in decimal. Anything else is not an id.
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
