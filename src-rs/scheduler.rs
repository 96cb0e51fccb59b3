//! Daily unattended research run.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::agent::{Agent, AgentRequest};
use crate::prompts::DAILY_RESEARCH_QUERY;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerStatus {
    Succeeded { session_id: String },
    Failed { session_id: String, error: String },
}

impl TriggerStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TriggerStatus::Succeeded { .. })
    }
}

pub struct ResearchTrigger {
    agent: Arc<Agent>,
}

impl ResearchTrigger {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    /// Runs the default research request once. The answer itself lands in
    /// the run log only.
    pub async fn fire(&self) -> TriggerStatus {
        info!(agent = %self.agent.name, "research trigger fired");
        let result = self.agent.execute(AgentRequest::new(DAILY_RESEARCH_QUERY), None).await;
        if result.success {
            TriggerStatus::Succeeded {
                session_id: result.session_id,
            }
        } else {
            TriggerStatus::Failed {
                session_id: result.session_id,
                error: result.error.unwrap_or_else(|| "unknown error".to_string()),
            }
        }
    }

    /// Fires at `at` local time every day until the task is dropped.
    pub async fn run_daily(self, at: NaiveTime) {
        loop {
            let now = Local::now();
            let next = next_fire(now, at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!("next research run at {}", next.format("%Y-%m-%d %H:%M"));
            tokio::time::sleep(wait).await;

            match self.fire().await {
                TriggerStatus::Succeeded { session_id } => {
                    info!(session = %session_id, "daily research completed")
                }
                TriggerStatus::Failed { session_id, error } => {
                    error!(session = %session_id, error = %error, "daily research failed")
                }
            }
        }
    }
}

/// First local time strictly after `now` whose wall clock reads `at`.
pub fn next_fire<Tz: TimeZone>(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > now {
                return candidate;
            }
        }
        day += ChronoDuration::days(1);
    }
    warn!("could not resolve local time {}; retrying in a day", at);
    now + ChronoDuration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn later_today_when_time_not_reached() {
        let now = Utc.with_ymd_and_hms(2024, 7, 4, 9, 0, 0).unwrap();
        assert_eq!(next_fire(now, at(10, 45)), Utc.with_ymd_and_hms(2024, 7, 4, 10, 45, 0).unwrap());
    }

    #[test]
    fn tomorrow_once_time_passed() {
        let now = Utc.with_ymd_and_hms(2024, 7, 4, 10, 45, 0).unwrap();
        assert_eq!(next_fire(now, at(10, 45)), Utc.with_ymd_and_hms(2024, 7, 5, 10, 45, 0).unwrap());

        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(next_fire(late, at(0, 15)), Utc.with_ymd_and_hms(2025, 1, 1, 0, 15, 0).unwrap());
    }

    #[test]
    fn status_serializes_with_tag() {
        let status = TriggerStatus::Failed {
            session_id: "s1".into(),
            error: "planner failed".into(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(!status.is_success());
    }
}
