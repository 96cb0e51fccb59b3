use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tools::{ToolCall, ToolSchema};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub raw: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolSchema>>,
    pub temperature: Option<f64>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub metadata: Option<Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: &str, message: &str, retryable: bool) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            retryable,
        }
    }

    /// Maps a non-success HTTP status and body onto an error code.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lowered = body.to_lowercase();
        if status == 401 || status == 403 {
            return ProviderError::new("auth_error", body, true);
        }
        if status == 429 || lowered.contains("quota") || lowered.contains("resource_exhausted") {
            return ProviderError::new("rate_limit", body, true);
        }
        if status >= 500 {
            return ProviderError::new("server_error", body, true);
        }
        ProviderError::new("api_error", body, false)
    }
}

/// Incremental text chunks from a streamed completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError>;

    /// Providers without native streaming yield the whole completion as one chunk.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, ProviderError> {
        let response = self.complete(request).await?;
        let chunk: Result<String, ProviderError> = Ok(response.content);
        Ok(Box::pin(futures::stream::iter(vec![chunk])))
    }

    /// Model ids this adapter serves.
    fn models(&self) -> Vec<String>;
}
