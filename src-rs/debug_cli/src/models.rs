use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub model: Option<String>,
    pub stream: bool,
    pub token: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
pub struct ResearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ResearchResponse {
    pub success: bool,
    pub output: String,
    pub session_id: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub agent: String,
    pub query: String,
    pub status: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub tool_calls: usize,
    pub created_at: String,
}
