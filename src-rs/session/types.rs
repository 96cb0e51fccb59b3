use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::history::History;
use super::ledger::IdentifierLedger;
use super::state::SessionState;
use crate::error::SessionError;
use crate::llm::Message;
use crate::tools::{ToolCall, ToolResult};

/// Per-request orchestration state. Owned by exactly one agent run.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub query: String,
    /// Earlier conversation turns, oldest first.
    pub context: Vec<Message>,
    /// Model requested by the caller, if any.
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    state: SessionState,
    history: History,
    ledger: IdentifierLedger,
    tool_calls: usize,
    iterations: usize,
}

impl Session {
    pub fn new(query: &str, context: Vec<Message>, model: Option<String>, history_budget_bytes: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.to_string(),
            context,
            model,
            started_at: Utc::now(),
            state: SessionState::Idle,
            history: History::new(history_budget_bytes),
            ledger: IdentifierLedger::default(),
            tool_calls: 0,
            iterations: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    /// Moves to `Failed` unless the session already ended.
    pub fn fail(&mut self) {
        if self.state.can_transition_to(SessionState::Failed) {
            self.state = SessionState::Failed;
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ledger(&self) -> &IdentifierLedger {
        &self.ledger
    }

    /// Appends a result and files the identifiers it produced.
    pub fn record(&mut self, call: ToolCall, result: ToolResult, identifiers: Vec<String>, follow_up: bool) {
        if result.success && !identifiers.is_empty() {
            self.ledger.record(&result.tool, identifiers.iter().cloned());
        }
        self.history.push(call, result, identifiers, follow_up);
    }

    pub fn count_calls(&mut self, n: usize) {
        self.tool_calls += n;
    }

    pub fn tool_calls(&self) -> usize {
        self.tool_calls
    }

    pub fn begin_turn(&mut self) -> usize {
        self.iterations += 1;
        self.iterations
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Compact description of the run for API responses and logs.
    pub fn trace(&self) -> Value {
        let calls: Vec<Value> = self
            .history
            .entries()
            .iter()
            .map(|entry| {
                json!({
                    "tool": entry.call.name,
                    "args": entry.call.args,
                    "success": entry.result.success,
                    "error": entry.result.error,
                    "follow_up": entry.follow_up,
                })
            })
            .collect();
        json!({
            "session_id": self.id,
            "state": self.state,
            "iterations": self.iterations,
            "tool_calls": self.tool_calls,
            "calls": calls,
        })
    }
}
