//! Deciding the next step of a session, and writing its final answer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::llm::{CompletionRequest, LLMRouter, Message, ProviderError};
use crate::prompts::{planner_system_prompt, FINAL_ANSWER_PROMPT};
use crate::session::Session;
use crate::tools::{ToolCall, ToolSchema};

/// Receives answer text as it is produced.
pub type TokenSink = UnboundedSender<String>;

#[derive(Clone, Debug, PartialEq)]
pub enum PlanStep {
    CallTools(Vec<ToolCall>),
    /// Enough is known; carries the planner's draft answer.
    Finalize(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, session: &Session) -> Result<PlanStep, ProviderError>;

    async fn finalize(
        &self,
        session: &Session,
        draft: &str,
        sink: Option<&TokenSink>,
    ) -> Result<String, ProviderError>;
}

/// Planner backed by an LLM with native function calling.
pub struct LlmPlanner {
    router: Arc<LLMRouter>,
    tools: Vec<ToolSchema>,
    system_prompt: String,
    config: AgentConfig,
}

impl LlmPlanner {
    pub fn new(router: Arc<LLMRouter>, tools: Vec<ToolSchema>, system_prompt: &str, config: AgentConfig) -> Self {
        Self {
            router,
            tools,
            system_prompt: system_prompt.to_string(),
            config,
        }
    }

    /// System prompt, prior conversation, the query, then one exchange per
    /// recorded call.
    pub fn messages(&self, session: &Session) -> Vec<Message> {
        let today = Local::now().date_naive();
        let mut messages = vec![Message::system(planner_system_prompt(
            &self.system_prompt,
            today,
            &session.ledger().render(),
        ))];
        messages.extend(session.context.iter().cloned());
        messages.push(Message::user(session.query.clone()));

        for entry in session.history().entries() {
            messages.push(Message::assistant(format!(
                "Calling tool {} with {}",
                entry.call.name, entry.call.args
            )));
            let content = if entry.result.success {
                let output = entry
                    .result
                    .output
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                format!("Tool {} result: {}", entry.call.name, output)
            } else {
                format!(
                    "Tool {} error: {}",
                    entry.call.name,
                    entry.result.error.clone().unwrap_or_else(|| "unknown error".to_string())
                )
            };
            messages.push(Message::user(content));
        }
        messages
    }

    fn request(&self, session: &Session, messages: Vec<Message>, with_tools: bool) -> CompletionRequest {
        let (model, provider) = match &session.model {
            Some(model) => (model.clone(), None),
            None => (self.config.model.clone(), Some(self.config.provider.clone())),
        };
        CompletionRequest {
            messages,
            tools: if with_tools && !self.tools.is_empty() {
                Some(self.tools.clone())
            } else {
                None
            },
            temperature: Some(self.config.temperature),
            model: Some(model),
            provider,
            metadata: None,
        }
    }

    fn final_messages(&self, session: &Session, draft: &str) -> Vec<Message> {
        let mut messages = self.messages(session);
        let mut instruction = FINAL_ANSWER_PROMPT.to_string();
        if !draft.trim().is_empty() {
            instruction.push_str("\n\nDraft answer: ");
            instruction.push_str(draft);
        }
        messages.push(Message::user(instruction));
        messages
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, session: &Session) -> Result<PlanStep, ProviderError> {
        let request = self.request(session, self.messages(session), true);
        let response = self.router.complete(request).await?;
        if response.tool_calls.is_empty() {
            Ok(PlanStep::Finalize(response.content))
        } else {
            debug!("planner requested {} tool calls", response.tool_calls.len());
            Ok(PlanStep::CallTools(response.tool_calls))
        }
    }

    async fn finalize(
        &self,
        session: &Session,
        draft: &str,
        sink: Option<&TokenSink>,
    ) -> Result<String, ProviderError> {
        if session.history().is_empty() {
            if let Some(sink) = sink {
                let _ = sink.send(draft.to_string());
            }
            return Ok(draft.to_string());
        }

        match sink {
            Some(sink) => {
                let request = self.request(session, self.final_messages(session, draft), false);
                let mut stream = self.router.stream(request).await?;
                let mut answer = String::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if chunk.is_empty() {
                        continue;
                    }
                    answer.push_str(&chunk);
                    if sink.send(chunk).is_err() {
                        warn!("token receiver dropped; finishing answer without streaming");
                    }
                }
                if answer.trim().is_empty() {
                    let _ = sink.send(draft.to_string());
                    return Ok(draft.to_string());
                }
                Ok(answer)
            }
            None if !draft.trim().is_empty() => Ok(draft.to_string()),
            None => {
                let request = self.request(session, self.final_messages(session, draft), false);
                Ok(self.router.complete(request).await?.content)
            }
        }
    }
}
