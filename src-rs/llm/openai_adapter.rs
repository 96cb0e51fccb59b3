//! Adapter for OpenAI-compatible chat-completion endpoints (xAI and friends).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::rotation::Rotator;
use super::sse::{parse_chunk_delta, SseDecoder};
use super::types::{CompletionRequest, LLMResponse, ProviderAdapter, ProviderError, TokenStream};
use crate::tools::ToolCall;

pub struct OpenAICompatConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub models: Vec<String>,
    pub temperature: f64,
    pub timeout: Duration,
}

pub struct OpenAICompatAdapter {
    cfg: OpenAICompatConfig,
    rotator: Rotator,
    client: Client,
}

impl OpenAICompatAdapter {
    pub fn new(cfg: OpenAICompatConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.trim().is_empty() {
            return Err(ProviderError::new("config_error", "base url required", false));
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
        let model = request
            .model
            .clone()
            .or_else(|| self.cfg.models.first().cloned())
            .ok_or_else(|| ProviderError::new("invalid_model", "no model configured", false))?;
        if !self.cfg.models.iter().any(|m| *m == model) {
            return Err(ProviderError::new(
                "invalid_model",
                &format!("model not allowed: {}", model),
                false,
            ));
        }
        Ok(model)
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, ProviderError> {
        let key = self
            .rotator
            .next()
            .ok_or_else(|| ProviderError::new("auth_error", "no API keys", false))?;
        let endpoint = format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(key)
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
}

#[async_trait]
impl ProviderAdapter for OpenAICompatAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let model = self.model_for(&request)?;
        let payload = build_payload(&model, &request, self.cfg.temperature, false);
        let resp = self.post(&payload).await?;
        let raw: Value = resp
            .json()
            .await
            .map_err(|_| ProviderError::new("parse_error", "invalid json", false))?;
        let (content, tool_calls) = parse_response(&raw)?;
        Ok(LLMResponse {
            content,
            tool_calls,
            raw: Some(raw),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, ProviderError> {
        let model = self.model_for(&request)?;
        let payload = build_payload(&model, &request, self.cfg.temperature, true);
        let resp = self.post(&payload).await?;
        let tokens = resp
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, chunk| {
                let items: Vec<Result<String, ProviderError>> = match chunk {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .iter()
                        .filter_map(|data| parse_chunk_delta(data).transpose())
                        .collect(),
                    Err(err) => vec![Err(ProviderError::new("network_error", &err.to_string(), true))],
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();
        Ok(Box::pin(tokens))
    }

    fn models(&self) -> Vec<String> {
        self.cfg.models.clone()
    }
}

fn build_payload(model: &str, request: &CompletionRequest, default_temperature: f64, stream: bool) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content}))
        .collect();
    let mut payload = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature.unwrap_or(default_temperature),
        "stream": stream,
    });
    if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
        let declared: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters.clone().unwrap_or(json!({})),
                    }
                })
            })
            .collect();
        payload["tools"] = json!(declared);
        payload["tool_choice"] = json!("auto");
    }
    payload
}

fn parse_response(raw: &Value) -> Result<(String, Vec<ToolCall>), ProviderError> {
    let message = raw
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::new("parse_error", "response has no choices", false))?;
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let name = call.pointer("/function/name").and_then(|v| v.as_str()).unwrap_or("");
            // Arguments arrive as a JSON-encoded string.
            let args = match call.pointer("/function/arguments") {
                Some(Value::String(encoded)) if encoded.trim().is_empty() => json!({}),
                Some(Value::String(encoded)) => serde_json::from_str(encoded).map_err(|_| {
                    ProviderError::new("parse_error", &format!("bad arguments for {}", name), false)
                })?,
                Some(other) => other.clone(),
                None => json!({}),
            };
            tool_calls.push(ToolCall::new(name, args));
        }
    }
    Ok((content, tool_calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use crate::tools::ToolSchema;

    #[test]
    fn payload_declares_functions() {
        let mut request = CompletionRequest::new(vec![Message::user("odds")]);
        request.tools = Some(vec![ToolSchema {
            name: "web_search".into(),
            description: "search".into(),
            parameters: None,
        }]);
        let payload = build_payload("grok-4-fast-reasoning", &request, 0.3, false);
        assert_eq!(payload["tools"][0]["function"]["name"], "web_search");
        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["stream"], false);
    }

    #[test]
    fn parses_encoded_tool_arguments() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_sport_event_markets", "arguments": "{\"sport_event_id\": 12345}"}
                    }]
                }
            }]
        });
        let (content, calls) = parse_response(&raw).unwrap();
        assert!(content.is_empty());
        assert_eq!(calls[0].name, "get_sport_event_markets");
        assert_eq!(calls[0].args["sport_event_id"], 12345);
    }

    #[test]
    fn rejects_malformed_arguments() {
        let raw = json!({
            "choices": [{"message": {"tool_calls": [{"function": {"name": "x", "arguments": "{oops"}}]}}]
        });
        assert!(parse_response(&raw).is_err());
        assert!(parse_response(&json!({"choices": []})).is_err());
    }
}
