use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Planning,
    Calling,
    Finalizing,
    Done,
    Failed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Planning)
                | (Planning, Calling)
                | (Planning, Finalizing)
                | (Calling, Planning)
                | (Calling, Finalizing)
                | (Finalizing, Done)
                | (Idle, Failed)
                | (Planning, Failed)
                | (Calling, Failed)
                | (Finalizing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }

    pub fn transition(self, next: SessionState) -> Result<SessionState, SessionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SessionError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Planning => "planning",
            SessionState::Calling => "calling",
            SessionState::Finalizing => "finalizing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
