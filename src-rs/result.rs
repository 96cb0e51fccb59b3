use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    pub session_id: String,
    pub error: Option<String>,
    pub trace: Option<Value>,
}

impl AgentResult {
    pub fn completed(session_id: &str, output: String, trace: Value) -> Self {
        Self {
            success: true,
            output,
            session_id: session_id.to_string(),
            error: None,
            trace: Some(trace),
        }
    }

    pub fn failed(session_id: &str, error: String, trace: Value) -> Self {
        Self {
            success: false,
            output: String::new(),
            session_id: session_id.to_string(),
            error: Some(error),
            trace: Some(trace),
        }
    }
}
