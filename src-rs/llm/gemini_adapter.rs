use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::rotation::Rotator;
use super::sse::SseDecoder;
use super::types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError, TokenStream};
use crate::tools::{ToolCall, ToolSchema};

pub const GEMINI_ALLOWED_MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

pub struct GeminiConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

pub struct GeminiAdapter {
    cfg: GeminiConfig,
    rotator: Rotator,
    client: Client,
}

impl GeminiAdapter {
    pub fn new(mut cfg: GeminiConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = "https://generativelanguage.googleapis.com".to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = GEMINI_ALLOWED_MODELS[0].to_string();
        }
        if cfg.temperature == 0.0 {
            cfg.temperature = 0.3;
        }
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string(), false))?;
        Ok(Self {
            rotator: Rotator::new(cfg.api_keys.clone()),
            cfg,
            client,
        })
    }

    fn model_for(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let model = request.model.clone().unwrap_or_else(|| self.cfg.model.clone());
        if !GEMINI_ALLOWED_MODELS.iter().any(|m| *m == model) {
            return Err(ProviderError::new(
                "invalid_model",
                &format!("model not allowed: {}", model),
                false,
            ));
        }
        Ok(model)
    }

    /// Tries each key once; auth, quota and server errors move on to the
    /// next key.
    async fn post(&self, path: &str, payload: &Value) -> Result<reqwest::Response, ProviderError> {
        let tries = self.rotator.len();
        if tries == 0 {
            return Err(ProviderError::new("auth_error", "no Gemini API keys", false));
        }
        let endpoint = format!("{}/v1beta/models/{}", self.cfg.base_url.trim_end_matches('/'), path);
        let mut last_err = None;
        for _ in 0..tries {
            let key = match self.rotator.next() {
                Some(key) => key,
                None => break,
            };
            match send(&self.client, &endpoint, &key, payload).await {
                Ok(resp) => return Ok(resp),
                Err(err) if err.retryable => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::new("api_error", "request failed", true)))
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let model = self.model_for(&request)?;
        let temperature = request.temperature.unwrap_or(self.cfg.temperature);
        let payload = build_payload(&request.messages, request.tools.as_ref(), temperature);
        let resp = self.post(&format!("{}:generateContent", model), &payload).await?;
        let raw: Value = resp
            .json()
            .await
            .map_err(|_| ProviderError::new("parse_error", "invalid json", false))?;
        let (content, tool_calls) = parse_response(&raw);
        Ok(LLMResponse {
            content,
            tool_calls,
            raw: Some(raw),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, ProviderError> {
        let model = self.model_for(&request)?;
        let temperature = request.temperature.unwrap_or(self.cfg.temperature);
        let payload = build_payload(&request.messages, request.tools.as_ref(), temperature);
        let resp = self
            .post(&format!("{}:streamGenerateContent?alt=sse", model), &payload)
            .await?;
        let tokens = resp
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items: Vec<Result<String, ProviderError>> = match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .iter()
                        .filter_map(|data| parse_stream_text(data).transpose())
                        .collect(),
                    Err(err) => vec![Err(ProviderError::new("network_error", &err.to_string(), true))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();
        Ok(Box::pin(tokens))
    }

    fn models(&self) -> Vec<String> {
        GEMINI_ALLOWED_MODELS.iter().map(|m| m.to_string()).collect()
    }
}

fn build_payload(messages: &[Message], tools: Option<&Vec<ToolSchema>>, temperature: f64) -> Value {
    let mut contents = Vec::new();
    let mut system_instruction = None;

    for msg in messages {
        if msg.role == "system" {
            system_instruction = Some(msg.content.clone());
            continue;
        }
        let role = if msg.role == "user" { "user" } else { "model" };
        contents.push(json!({
            "role": role,
            "parts": [{"text": msg.content}]
        }));
    }

    let mut payload = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": temperature
        }
    });

    if let Some(system) = system_instruction {
        payload["systemInstruction"] = json!({
            "parts": [{"text": system}]
        });
    }

    if let Some(tools) = tools.filter(|t| !t.is_empty()) {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters.clone().unwrap_or(json!({})),
                })
            })
            .collect();
        payload["tools"] = json!([
            {
                "functionDeclarations": declarations
            }
        ]);
    }

    payload
}

async fn send(client: &Client, endpoint: &str, api_key: &str, payload: &Value) -> Result<reqwest::Response, ProviderError> {
    let resp = client
        .post(endpoint)
        .header("x-goog-api-key", api_key)
        .json(payload)
        .send()
        .await
        .map_err(|err| ProviderError::new("network_error", &err.to_string(), true))?;
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &body));
    }
    Ok(resp)
}

/// Text of one streamed `GenerateContentResponse`; `None` when it carries none.
fn parse_stream_text(data: &str) -> Result<Option<String>, ProviderError> {
    let raw: Value = serde_json::from_str(data)
        .map_err(|_| ProviderError::new("parse_error", "invalid stream chunk", false))?;
    if let Some(err) = raw.get("error") {
        return Err(ProviderError::new("api_error", &err.to_string(), false));
    }
    let (text, _) = parse_response(&raw);
    Ok(Some(text).filter(|t| !t.is_empty()))
}

fn parse_response(raw: &Value) -> (String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    let parts = match raw.pointer("/candidates/0/content/parts").and_then(|v| v.as_array()) {
        Some(parts) => parts,
        None => return (text, tool_calls),
    };

    for part in parts {
        if let Some(chunk) = part.get("text").and_then(|v| v.as_str()) {
            text.push_str(chunk);
        }
        if let Some(fc) = part.get("functionCall") {
            let name = fc.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let args = fc.get("args").cloned().unwrap_or(json!({}));
            tool_calls.push(ToolCall::new(name, args));
        }
    }

    (text, tool_calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_splits_system_and_declares_tools() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("odds?"),
            Message::assistant("checking"),
        ];
        let tools = vec![ToolSchema {
            name: "get_daily_schedule_odds".into(),
            description: "odds schedule".into(),
            parameters: Some(json!({"type": "object"})),
        }];
        let payload = build_payload(&messages, Some(&tools), 0.2);
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(payload["contents"].as_array().unwrap().len(), 2);
        assert_eq!(payload["contents"][1]["role"], "model");
        assert_eq!(
            payload["tools"][0]["functionDeclarations"][0]["name"],
            "get_daily_schedule_odds"
        );
    }

    #[test]
    fn payload_without_tools_has_no_declarations() {
        let payload = build_payload(&[Message::user("hi")], Some(&Vec::new()), 0.3);
        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn parses_text_and_function_calls() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Looking up "},
                        {"functionCall": {"name": "get_daily_schedule_odds", "args": {"sport_name": "NFL", "date": "2024-09-05"}}}
                    ]
                }
            }]
        });
        let (text, calls) = parse_response(&raw);
        assert_eq!(text, "Looking up ");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_daily_schedule_odds");
        assert_eq!(calls[0].args["sport_name"], "NFL");
    }

    #[test]
    fn stream_chunks_yield_text_or_error() {
        let chunk = r#"{"candidates":[{"content":{"parts":[{"text":"Chiefs "}],"role":"model"}}]}"#;
        assert_eq!(parse_stream_text(chunk).unwrap().as_deref(), Some("Chiefs "));
        let empty = r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}"#;
        assert!(parse_stream_text(empty).unwrap().is_none());
        assert!(parse_stream_text(r#"{"error":{"code":429}}"#).is_err());
    }

    #[test]
    fn empty_candidates_yield_nothing() {
        let (text, calls) = parse_response(&json!({"candidates": []}));
        assert!(text.is_empty());
        assert!(calls.is_empty());
    }
}
