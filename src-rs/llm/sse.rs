//! Line decoder for `text/event-stream` bodies.

use serde_json::Value;

use super::types::ProviderError;

/// Accumulates raw bytes and yields the payload of every complete `data:` line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(&['\r', '\n'][..]);
            if let Some(data) = text.strip_prefix("data:") {
                out.push(data.trim_start().to_string());
            }
        }
        out
    }
}

/// Content delta of one OpenAI-style `chat.completion.chunk`; `None` for
/// `[DONE]` and chunks without text.
pub fn parse_chunk_delta(data: &str) -> Result<Option<String>, ProviderError> {
    if data == "[DONE]" {
        return Ok(None);
    }
    let raw: Value = serde_json::from_str(data)
        .map_err(|_| ProviderError::new("parse_error", "invalid stream chunk", false))?;
    if let Some(err) = raw.get("error") {
        return Err(ProviderError::new("api_error", &err.to_string(), false));
    }
    let delta = raw
        .pointer("/choices/0/delta/content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    Ok(delta)
}
