use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::tools::{ToolCall, ToolResult};

#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub call: ToolCall,
    pub result: ToolResult,
    /// Issued by the orchestrator rather than the planner.
    pub follow_up: bool,
    pub identifiers: Vec<String>,
    pub payload_bytes: usize,
    pub compacted: bool,
}

/// Ordered call/result log of one session. Once live payloads exceed the
/// byte budget the oldest ones are swapped for a digest; entries stay.
#[derive(Clone, Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    budget_bytes: usize,
    live_bytes: usize,
}

impl History {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: Vec::new(),
            budget_bytes,
            live_bytes: 0,
        }
    }

    pub fn push(&mut self, call: ToolCall, result: ToolResult, identifiers: Vec<String>, follow_up: bool) {
        let payload_bytes = result
            .output
            .as_ref()
            .map(|output| output.to_string().len())
            .unwrap_or(0);
        self.live_bytes += payload_bytes;
        self.entries.push(HistoryEntry {
            call,
            result,
            follow_up,
            identifiers,
            payload_bytes,
            compacted: false,
        });
        self.compact();
    }

    // The newest entry is never compacted: the planner has not seen it yet.
    fn compact(&mut self) {
        let newest = self.entries.len().saturating_sub(1);
        for entry in self.entries.iter_mut().take(newest) {
            if self.live_bytes <= self.budget_bytes {
                break;
            }
            if entry.compacted || entry.result.output.is_none() {
                continue;
            }
            entry.result.output = Some(digest(entry));
            entry.compacted = true;
            self.live_bytes -= entry.payload_bytes;
            debug!(
                "compacted {} result ({} bytes), live payload now {} bytes",
                entry.call.name, entry.payload_bytes, self.live_bytes
            );
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }
}

fn digest(entry: &HistoryEntry) -> Value {
    json!({
        "compacted": true,
        "tool": entry.call.name,
        "bytes": entry.payload_bytes,
        "identifiers": entry.identifiers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(tool: &str, size: usize) -> ToolResult {
        ToolResult::ok(tool, json!({ "blob": "x".repeat(size) }))
    }

    #[test]
    fn oldest_payloads_compacted_first() {
        let mut history = History::new(250);
        history.push(ToolCall::new("get_daily_schedule", json!({})), result("get_daily_schedule", 100), vec!["g1".into()], false);
        history.push(ToolCall::new("get_daily_injuries", json!({})), result("get_daily_injuries", 100), vec![], true);
        assert!(!history.entries()[0].compacted);

        history.push(ToolCall::new("get_game_summary", json!({})), result("get_game_summary", 100), vec![], false);
        let entries = history.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].compacted);
        assert!(!entries[1].compacted);
        assert!(!entries[2].compacted);
        let digest = entries[0].result.output.as_ref().unwrap();
        assert_eq!(digest["identifiers"], json!(["g1"]));
        assert!(history.live_bytes() <= 250);
    }

    #[test]
    fn newest_entry_survives_even_when_oversized() {
        let mut history = History::new(10);
        history.push(ToolCall::new("get_game_roster", json!({})), result("get_game_roster", 500), vec![], false);
        assert!(!history.entries()[0].compacted);
        history.push(ToolCall::new("get_game_statistics", json!({})), ToolResult::failed("get_game_statistics", "refused"), vec![], false);
        assert!(history.entries()[0].compacted);
        assert_eq!(history.live_bytes(), 0);
    }
}
