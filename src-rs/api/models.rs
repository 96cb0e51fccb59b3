//! OpenAI-compatible wire types for the chat endpoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// Only the last this-many request messages reach the planner.
pub const CONTEXT_MESSAGES: usize = 10;

#[derive(Clone, Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// The final user message is the query; up to `CONTEXT_MESSAGES` earlier
    /// messages become context.
    pub fn split_query(&self) -> Option<(String, Vec<Message>)> {
        let idx = self.messages.iter().rposition(|m| m.role == "user")?;
        let query = self.messages[idx].content.trim().to_string();
        if query.is_empty() {
            return None;
        }
        let earlier = &self.messages[..idx];
        let start = earlier.len().saturating_sub(CONTEXT_MESSAGES);
        Some((query, earlier[start..].to_vec()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl ChatCompletion {
    pub fn new(id: &str, model: &str, content: String) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion".to_string(),
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    fn with(id: &str, model: &str, delta: Delta, finish_reason: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(|r| r.to_string()),
            }],
        }
    }

    pub fn role(id: &str, model: &str) -> Self {
        let delta = Delta {
            role: Some("assistant".to_string()),
            content: None,
        };
        Self::with(id, model, delta, None)
    }

    pub fn content(id: &str, model: &str, text: String) -> Self {
        let delta = Delta {
            role: None,
            content: Some(text),
        };
        Self::with(id, model, delta, None)
    }

    pub fn stop(id: &str, model: &str) -> Self {
        Self::with(id, model, Delta::default(), Some("stop"))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelCard {
    pub id: String,
    pub object: &'static str,
    pub owned_by: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunsQuery {
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl ErrorBody {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: kind.to_string(),
            },
        }
    }
}
