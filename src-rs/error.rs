use std::time::Duration;

use thiserror::Error;

use crate::llm::ProviderError;

/// Failure of a single HTTP call against an external provider.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("provider error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Network errors, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::Timeout(_) => true,
            ClientError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(timeout)
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Errors raised by the tool registry.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("schema violation in {tool}: {reason}")]
    SchemaViolation { tool: String, reason: String },

    #[error("tool {tool} failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid registration: {0}")]
    Registration(String),
}

impl ToolError {
    pub fn schema(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::SchemaViolation {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    pub fn execution(tool: &str, source: ClientError) -> Self {
        ToolError::ToolExecution {
            tool: tool.to_string(),
            source,
        }
    }
}

/// Errors that end an orchestration session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{tool} needs a {needed} returned earlier in this session, got {value:?}")]
    MissingDependency {
        tool: String,
        needed: String,
        value: String,
    },

    #[error("session budget exceeded: {0}")]
    SessionBudgetExceeded(String),

    #[error("planner failed: {0}")]
    Planner(#[from] ProviderError),

    #[error("session timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential {0}")]
    MissingCredential(String),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("llm setup failed: {0}")]
    Llm(String),

    #[error("client setup failed: {0}")]
    Client(String),

    #[error("tool registration failed: {0}")]
    Tools(#[source] ToolError),
}
