use std::collections::VecDeque;
use std::sync::RwLock;

use chrono::Utc;

use super::types::{RunRecord, RunStatus};

pub const DEFAULT_CAPACITY: usize = 200;

/// In-memory log of recent sessions. The oldest record is evicted once the
/// store is full; nothing is written to disk.
pub struct RunStore {
    capacity: usize,
    runs: RwLock<VecDeque<RunRecord>>,
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RunStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            runs: RwLock::new(VecDeque::new()),
        }
    }

    pub fn create(&self, id: &str, agent: &str, query: &str) -> RunRecord {
        let run = RunRecord {
            id: id.to_string(),
            agent: agent.to_string(),
            query: query.to_string(),
            status: RunStatus::Running,
            output: None,
            error: None,
            tool_calls: 0,
            created_at: Utc::now(),
            completed_at: None,
        };
        if let Ok(mut runs) = self.runs.write() {
            while runs.len() >= self.capacity {
                runs.pop_front();
            }
            runs.push_back(run.clone());
        }
        run
    }

    pub fn finish(
        &self,
        id: &str,
        status: RunStatus,
        output: Option<String>,
        error: Option<String>,
        tool_calls: usize,
    ) -> Option<RunRecord> {
        let mut runs = self.runs.write().ok()?;
        let run = runs.iter_mut().find(|run| run.id == id)?;
        run.status = status;
        run.output = output;
        run.error = error;
        run.tool_calls = tool_calls;
        if status != RunStatus::Running {
            run.completed_at = Some(Utc::now());
        }
        Some(run.clone())
    }

    pub fn get(&self, id: &str) -> Option<RunRecord> {
        let runs = self.runs.read().ok()?;
        runs.iter().find(|run| run.id == id).cloned()
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<RunRecord> {
        match self.runs.read() {
            Ok(runs) => runs.iter().rev().take(limit).cloned().collect(),
            Err(_) => vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.runs.read().map(|runs| runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_updates_record() {
        let store = RunStore::default();
        store.create("s1", "sports", "odds for KC");
        let done = store
            .finish("s1", RunStatus::Completed, Some("KC -125".into()), None, 2)
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.tool_calls, 2);
        assert!(done.completed_at.is_some());
        assert!(store.finish("missing", RunStatus::Failed, None, None, 0).is_none());
    }

    #[test]
    fn bounded_and_newest_first() {
        let store = RunStore::new(2);
        store.create("a", "sports", "1");
        store.create("b", "sports", "2");
        store.create("c", "research", "3");
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_none());
        let ids: Vec<String> = store.list(10).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(store.list(1).len(), 1);
    }
}
