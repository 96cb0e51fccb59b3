use std::io::{BufRead, BufReader};

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::Value;

use crate::models::{ChatCompletion, ChatRequest, ResearchRequest, ResearchResponse, RunInfo};

/// Agent sessions can run for minutes.
const REQUEST_TIMEOUT_SECS: u64 = 180;

pub struct HTTPClient {
    pub base_url: String,
    pub token: Option<String>,
    client: Client,
}

/// One parsed `data:` line of a chat completion stream.
#[derive(Debug, PartialEq)]
pub enum StreamLine {
    Delta(String),
    Error(String),
    Done,
    Skip,
}

pub fn parse_stream_line(line: &str) -> StreamLine {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        None => return StreamLine::Skip,
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => return StreamLine::Skip,
    };
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| err.to_string());
        return StreamLine::Error(message);
    }
    match value.pointer("/choices/0/delta/content").and_then(|v| v.as_str()) {
        Some(text) if !text.is_empty() => StreamLine::Delta(text.to_string()),
        _ => StreamLine::Skip,
    }
}

impl HTTPClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            base_url: base_url.to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self
            .token
            .as_ref()
            .and_then(|token| HeaderValue::from_str(&format!("Bearer {}", token)).ok())
        {
            Some(header) => builder.header(AUTHORIZATION, header),
            None => builder,
        }
    }

    fn check(resp: Response) -> Result<Response, String> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            Err(format!("http {}: {}", status.as_u16(), body))
        }
    }

    pub fn chat(&self, req: &ChatRequest) -> Result<String, String> {
        let resp = self
            .authorized(self.client.post(self.url("/v1/chat/completions")))
            .json(req)
            .send()
            .map_err(|err| err.to_string())?;
        let completion = Self::check(resp)?
            .json::<ChatCompletion>()
            .map_err(|err| err.to_string())?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "empty completion".to_string())
    }

    /// Calls `on_delta` for each streamed piece and returns the whole answer.
    pub fn chat_stream(&self, req: &ChatRequest, mut on_delta: impl FnMut(&str)) -> Result<String, String> {
        let resp = self
            .authorized(self.client.post(self.url("/v1/chat/completions")))
            .json(req)
            .send()
            .map_err(|err| err.to_string())?;
        let reader = BufReader::new(Self::check(resp)?);
        let mut answer = String::new();
        for line in reader.lines() {
            let line = line.map_err(|err| err.to_string())?;
            match parse_stream_line(&line) {
                StreamLine::Delta(text) => {
                    on_delta(&text);
                    answer.push_str(&text);
                }
                StreamLine::Error(message) => return Err(message),
                StreamLine::Done => break,
                StreamLine::Skip => {}
            }
        }
        Ok(answer)
    }

    pub fn research(&self, query: &str) -> Result<ResearchResponse, String> {
        let resp = self
            .authorized(self.client.post(self.url("/v1/research")))
            .json(&ResearchRequest {
                query: query.to_string(),
            })
            .send()
            .map_err(|err| err.to_string())?;
        // Failed sessions still carry a result body.
        resp.json::<ResearchResponse>().map_err(|err| err.to_string())
    }

    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunInfo>, String> {
        let resp = self
            .authorized(self.client.get(self.url(&format!("/runs?limit={}", limit))))
            .send()
            .map_err(|err| err.to_string())?;
        let value = Self::check(resp)?
            .json::<Value>()
            .map_err(|err| err.to_string())?;
        let runs = value
            .get("runs")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(runs
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RunInfo>(item).ok())
            .collect())
    }

    pub fn get_run(&self, id: &str) -> Result<RunInfo, String> {
        let resp = self
            .authorized(self.client.get(self.url(&format!("/runs/{}", id))))
            .send()
            .map_err(|err| err.to_string())?;
        Self::check(resp)?.json::<RunInfo>().map_err(|err| err.to_string())
    }
}
