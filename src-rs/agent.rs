use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::error::{SessionError, ToolError};
use crate::llm::Message;
use crate::planner::{PlanStep, Planner, TokenSink};
use crate::result::AgentResult;
use crate::runs::{RunStatus, RunStore};
use crate::session::{Session, SessionState};
use crate::tools::{ToolCall, ToolRegistry, ToolResult};
use crate::workflow;

#[derive(Clone, Debug, Default)]
pub struct AgentRequest {
    pub query: String,
    /// Earlier conversation turns, oldest first.
    pub context: Vec<Message>,
    pub model: Option<String>,
}

impl AgentRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Vec<Message>) -> Self {
        self.context = context;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Runs one planner-driven session per request against a shared registry.
pub struct Agent {
    pub name: String,
    pub config: AgentConfig,
    planner: Arc<dyn Planner>,
    tools: Arc<ToolRegistry>,
    runs: Option<Arc<RunStore>>,
}

impl Agent {
    pub fn new(name: &str, config: AgentConfig, planner: Arc<dyn Planner>, tools: Arc<ToolRegistry>) -> Self {
        let resolved_name = if name.is_empty() { "agent" } else { name };
        Self {
            name: resolved_name.to_string(),
            config,
            planner,
            tools,
            runs: None,
        }
    }

    pub fn with_runs(mut self, runs: Arc<RunStore>) -> Self {
        self.runs = Some(runs);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer text is also pushed to `sink` as it is produced.
    pub async fn execute(&self, request: AgentRequest, sink: Option<TokenSink>) -> AgentResult {
        let mut session = Session::new(
            request.query.trim(),
            request.context,
            request.model,
            self.config.history_budget_bytes,
        );
        info!(session = %session.id, agent = %self.name, "session started");
        if let Some(runs) = &self.runs {
            runs.create(&session.id, &self.name, &session.query);
        }

        let outcome = if session.query.is_empty() {
            Err(SessionError::InvalidRequest("query required".to_string()))
        } else {
            match tokio::time::timeout(self.config.request_timeout, self.run(&mut session, sink.as_ref())).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SessionError::Timeout(self.config.request_timeout)),
            }
        };

        match outcome {
            Ok(answer) => {
                info!(
                    session = %session.id,
                    tool_calls = session.tool_calls(),
                    turns = session.iterations(),
                    "session done"
                );
                self.finish_run(&session, RunStatus::Completed, Some(answer.clone()), None);
                AgentResult::completed(&session.id, answer, session.trace())
            }
            Err(err) => {
                session.fail();
                error!(session = %session.id, error = %err, "session failed");
                self.finish_run(&session, RunStatus::Failed, None, Some(err.to_string()));
                AgentResult::failed(&session.id, err.to_string(), session.trace())
            }
        }
    }

    fn finish_run(&self, session: &Session, status: RunStatus, output: Option<String>, error: Option<String>) {
        if let Some(runs) = &self.runs {
            runs.finish(&session.id, status, output, error, session.tool_calls());
        }
    }

    async fn run(&self, session: &mut Session, sink: Option<&TokenSink>) -> Result<String, SessionError> {
        session.transition(SessionState::Planning)?;
        let draft = loop {
            if session.iterations() >= self.config.max_iterations {
                return Err(SessionError::SessionBudgetExceeded(format!(
                    "{} planning turns used",
                    self.config.max_iterations
                )));
            }
            let turn = session.begin_turn();
            let calls = match self.planner.plan(session).await? {
                PlanStep::Finalize(draft) => break draft,
                PlanStep::CallTools(calls) if calls.is_empty() => break String::new(),
                PlanStep::CallTools(calls) => calls,
            };

            // Injury follow-ups always run once their schedule succeeds, so
            // their slots are taken up front.
            let reserved = workflow::reserved_follow_ups(&calls, session.history());
            let requested = session.tool_calls() + calls.len() + reserved;
            if requested > self.config.max_tool_calls {
                return Err(SessionError::SessionBudgetExceeded(format!(
                    "{} tool calls requested ({} follow-ups), limit is {}",
                    requested, reserved, self.config.max_tool_calls
                )));
            }

            debug!(session = %session.id, turn, calls = calls.len(), "dispatching");
            session.transition(SessionState::Calling)?;
            if let Some(draft) = self.dispatch(session, calls).await? {
                info!(session = %session.id, "no games scheduled; finalizing early");
                break draft;
            }
            session.transition(SessionState::Planning)?;
        };

        session.transition(SessionState::Finalizing)?;
        let answer = self.planner.finalize(session, &draft, sink).await?;
        session.transition(SessionState::Done)?;
        Ok(answer)
    }

    /// Runs one turn's calls concurrently and records them in issue order.
    /// Every outcome is recorded and follow-ups run before the first fatal
    /// error is returned. Returns a draft answer when the turn leaves nothing
    /// left to plan.
    async fn dispatch(&self, session: &mut Session, calls: Vec<ToolCall>) -> Result<Option<String>, SessionError> {
        session.count_calls(calls.len());
        let ledger = session.ledger();
        let session_id = session.id.as_str();
        let pending = calls.iter().map(|call| async move {
            match workflow::check_dependency(call, ledger) {
                Err(refusal) => {
                    warn!(session = %session_id, tool = %call.name, "refused: {}", refusal);
                    Ok(ToolResult::failed(&call.name, refusal.to_string()))
                }
                Ok(()) => {
                    info!(session = %session_id, tool = %call.name, "tool call");
                    self.tools.invoke(call).await
                }
            }
        });
        let outcomes = join_all(pending).await;

        let mut fatal: Option<ToolError> = None;
        let mut turn = Vec::with_capacity(calls.len());
        let mut follow_ups: Vec<ToolCall> = Vec::new();
        for (call, outcome) in calls.into_iter().zip(outcomes) {
            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    session.record(call.clone(), ToolResult::failed(&call.name, err.to_string()), Vec::new(), false);
                    fatal = fatal.or(Some(err));
                    continue;
                }
            };
            for extra in workflow::follow_ups(&call, &result) {
                if !follow_ups.iter().any(|queued| workflow::same_date_call(queued, &extra)) {
                    follow_ups.push(extra);
                }
            }
            let identifiers = workflow::harvest(&result);
            session.record(call.clone(), result.clone(), identifiers, false);
            turn.push((call, result));
        }

        // Skip dates whose injuries are already in the history.
        follow_ups.retain(|extra| {
            !session
                .history()
                .entries()
                .iter()
                .any(|entry| entry.result.success && workflow::same_date_call(&entry.call, extra))
        });
        if !follow_ups.is_empty() {
            session.count_calls(follow_ups.len());
            for call in &follow_ups {
                info!(session = %session.id, tool = %call.name, "follow-up call");
            }
            let outcomes = join_all(follow_ups.iter().map(|call| self.tools.invoke(call))).await;
            for (call, outcome) in follow_ups.into_iter().zip(outcomes) {
                match outcome {
                    Ok(result) => {
                        let identifiers = workflow::harvest(&result);
                        session.record(call, result, identifiers, true);
                    }
                    Err(err) => {
                        session.record(call.clone(), ToolResult::failed(&call.name, err.to_string()), Vec::new(), true);
                        fatal = fatal.or(Some(err));
                    }
                }
            }
        }

        if let Some(err) = fatal {
            return Err(err.into());
        }
        Ok(workflow::empty_schedule_draft(&turn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;
    use crate::search::{self, testing::FakeSearch};
    use crate::sports::client::testing::FakeFeed;
    use crate::sports::{nba, nfl, odds, sports_registry, ResponseCache, SportsFeeds};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Plays back plan steps; finalize echoes the draft.
    struct ScriptedPlanner {
        steps: Mutex<Vec<PlanStep>>,
        drafts: Mutex<Vec<String>>,
    }

    impl ScriptedPlanner {
        fn new(steps: Vec<PlanStep>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps),
                drafts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn plan(&self, _session: &Session) -> Result<PlanStep, ProviderError> {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                return Err(ProviderError::new("exhausted", "no scripted step", false));
            }
            Ok(steps.remove(0))
        }

        async fn finalize(
            &self,
            _session: &Session,
            draft: &str,
            sink: Option<&TokenSink>,
        ) -> Result<String, ProviderError> {
            self.drafts.lock().unwrap().push(draft.to_string());
            if let Some(sink) = sink {
                let _ = sink.send(draft.to_string());
            }
            Ok(draft.to_string())
        }
    }

    fn sports_agent(feed: FakeFeed, planner: Arc<ScriptedPlanner>, runs: Arc<RunStore>) -> Agent {
        let feed = Arc::new(feed);
        let feeds = SportsFeeds {
            nfl: feed.clone(),
            nba: feed.clone(),
            odds: feed,
        };
        let registry = sports_registry(
            &feeds,
            Arc::new(ResponseCache::default()),
            Arc::new(FakeSearch::default()),
            Duration::from_secs(5),
        )
        .unwrap();
        Agent::new("sports", AgentConfig::default(), planner, Arc::new(registry)).with_runs(runs)
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::new(name, args)
    }

    #[tokio::test]
    async fn markets_follow_schedule_ids() {
        let feed = FakeFeed::default()
            .with(
                "sports/sr:sport:16/schedules/2024-09-05/schedules.json",
                Ok(json!({"sport_events": [{"id": 12345}]})),
            )
            .with(
                "sport_events/12345/sport_event_markets.json",
                Ok(json!({"markets": [{"name": "moneyline", "books": []}]})),
            );
        let planner = ScriptedPlanner::new(vec![
            PlanStep::CallTools(vec![call(
                odds::DAILY_SCHEDULE_ODDS,
                json!({"sport_name": "NFL", "date": "2024-09-05"}),
            )]),
            PlanStep::CallTools(vec![call(odds::SPORT_EVENT_MARKETS, json!({"sport_event_id": "12345"}))]),
            PlanStep::Finalize("Chiefs -125".into()),
        ]);
        let runs = Arc::new(RunStore::default());
        let agent = sports_agent(feed, planner, runs.clone());

        let result = agent.execute(AgentRequest::new("odds for chiefs ravens"), None).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "Chiefs -125");
        let trace = result.trace.unwrap();
        assert_eq!(trace["state"], "done");
        assert_eq!(trace["tool_calls"], 2);

        let run = runs.get(&result.session_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.tool_calls, 2);
    }

    #[tokio::test]
    async fn unknown_identifier_is_refused_not_fetched() {
        let planner = ScriptedPlanner::new(vec![
            PlanStep::CallTools(vec![call(nfl::GAME_STATISTICS, json!({"game_id": "made-up"}))]),
            PlanStep::Finalize("I could not find that game.".into()),
        ]);
        let feed = FakeFeed::default();
        let agent = sports_agent(feed, planner, Arc::new(RunStore::default()));

        let result = agent.execute(AgentRequest::new("stats for last night"), None).await;
        assert!(result.success);
        let trace = result.trace.unwrap();
        assert_eq!(trace["tool_calls"], 1);
        assert_eq!(trace["calls"][0]["success"], false);
        assert!(trace["calls"][0]["error"].as_str().unwrap().contains("find_game_by_teams_and_date"));
    }

    #[tokio::test]
    async fn empty_schedule_still_fetches_injuries() {
        let feed = FakeFeed::default()
            .with("games/2024/07/04/schedule.json", Ok(json!({"date": "2024-07-04", "games": []})))
            .with("league/2024/07/04/daily_injuries.json", Ok(json!({"teams": []})));
        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(vec![call(
            nba::DAILY_SCHEDULE,
            json!({"year": 2024, "month": 7, "day": 4}),
        )])]);
        let agent = sports_agent(feed, planner.clone(), Arc::new(RunStore::default()));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = agent.execute(AgentRequest::new("nba games july 4"), Some(tx)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, "No NBA games are scheduled on 2024-07-04.");
        assert_eq!(rx.recv().await.as_deref(), Some(result.output.as_str()));

        let trace = result.trace.unwrap();
        assert_eq!(trace["tool_calls"], 2);
        assert_eq!(trace["calls"][1]["tool"], nba::DAILY_INJURIES);
        assert_eq!(trace["calls"][1]["follow_up"], true);
        assert_eq!(trace["iterations"], 1);
    }

    #[tokio::test]
    async fn over_budget_turn_fails_before_dispatch() {
        let calls = (0..11)
            .map(|_| call(search::WEB_SEARCH, json!({"query": "nba"})))
            .collect();
        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(calls)]);
        let runs = Arc::new(RunStore::default());
        let agent = sports_agent(FakeFeed::default(), planner, runs.clone());

        let result = agent.execute(AgentRequest::new("search a lot"), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("budget"));
        let trace = result.trace.unwrap();
        assert_eq!(trace["state"], "failed");
        assert_eq!(trace["tool_calls"], 0);
        assert_eq!(runs.get(&result.session_id).unwrap().status, RunStatus::Failed);
    }

    fn nba_day(day: u32) -> ToolCall {
        call(nba::DAILY_SCHEDULE, json!({"year": 2024, "month": 1, "day": day}))
    }

    fn nba_days(feed: FakeFeed, days: std::ops::RangeInclusive<u32>) -> FakeFeed {
        days.fold(feed, |feed, day| {
            feed.with(
                &format!("games/2024/01/{:02}/schedule.json", day),
                Ok(json!({"date": format!("2024-01-{:02}", day), "games": []})),
            )
            .with(&format!("league/2024/01/{:02}/daily_injuries.json", day), Ok(json!({"teams": []})))
        })
    }

    #[tokio::test]
    async fn injury_follow_ups_take_budget_slots() {
        let planner = ScriptedPlanner::new(vec![
            PlanStep::CallTools((1..=10).map(nba_day).collect()),
            PlanStep::Finalize("done".into()),
        ]);
        let feed = nba_days(FakeFeed::default(), 1..=10);
        let agent = sports_agent(feed, planner, Arc::new(RunStore::default()));
        let result = agent.execute(AgentRequest::new("nba first ten days"), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("budget"));
        assert_eq!(result.trace.unwrap()["tool_calls"], 0);

        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools((1..=5).map(nba_day).collect())]);
        let feed = nba_days(FakeFeed::default(), 1..=5);
        let agent = sports_agent(feed, planner, Arc::new(RunStore::default()));
        let result = agent.execute(AgentRequest::new("nba first five days"), None).await;
        assert!(result.success, "{:?}", result.error);
        let trace = result.trace.unwrap();
        assert_eq!(trace["tool_calls"], 10);
    }

    #[tokio::test]
    async fn fatal_call_keeps_the_rest_of_its_turn() {
        let feed = FakeFeed::default()
            .with("games/2024/07/04/schedule.json", Ok(json!({"date": "2024-07-04", "games": []})))
            .with("league/2024/07/04/daily_injuries.json", Ok(json!({"teams": []})));
        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(vec![
            call("get_weather", json!({})),
            call(nba::DAILY_SCHEDULE, json!({"year": 2024, "month": 7, "day": 4})),
        ])]);
        let agent = sports_agent(feed, planner, Arc::new(RunStore::default()));

        let result = agent.execute(AgentRequest::new("weather and nba"), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
        let trace = result.trace.unwrap();
        assert_eq!(trace["tool_calls"], 3);
        let calls = trace["calls"].as_array().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0]["tool"], "get_weather");
        assert_eq!(calls[0]["success"], false);
        assert_eq!(calls[1]["tool"], nba::DAILY_SCHEDULE);
        assert_eq!(calls[1]["success"], true);
        assert_eq!(calls[2]["tool"], nba::DAILY_INJURIES);
        assert_eq!(calls[2]["follow_up"], true);
    }

    #[tokio::test]
    async fn registry_errors_end_the_session() {
        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(vec![call("get_weather", json!({}))])]);
        let agent = sports_agent(FakeFeed::default(), planner, Arc::new(RunStore::default()));
        let result = agent.execute(AgentRequest::new("weather?"), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));

        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(vec![call(
            nba::DAILY_SCHEDULE,
            json!({"year": 2024, "month": 13, "day": 4}),
        )])]);
        let agent = sports_agent(FakeFeed::default(), planner, Arc::new(RunStore::default()));
        let result = agent.execute(AgentRequest::new("nba?"), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("schema violation"));
    }

    #[tokio::test]
    async fn impossible_date_is_a_schema_violation() {
        let planner = ScriptedPlanner::new(vec![PlanStep::CallTools(vec![call(
            nba::DAILY_SCHEDULE,
            json!({"year": 2023, "month": 2, "day": 30}),
        )])]);
        let agent = sports_agent(FakeFeed::default(), planner, Arc::new(RunStore::default()));
        let result = agent.execute(AgentRequest::new("nba feb 30"), None).await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("schema violation"), "{}", error);
        assert!(error.contains("2023-02-30"));
        assert_eq!(result.trace.unwrap()["calls"][0]["success"], false);
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let planner = ScriptedPlanner::new(vec![]);
        let runs = Arc::new(RunStore::default());
        let agent = sports_agent(FakeFeed::default(), planner, runs.clone());
        let result = agent.execute(AgentRequest::new("   "), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("query required"));
        assert_eq!(result.trace.unwrap()["state"], "failed");
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn iteration_cap_is_enforced() {
        let steps = (0..3)
            .map(|_| PlanStep::CallTools(vec![call(search::WEB_SEARCH, json!({"query": "nba"}))]))
            .collect();
        let planner = ScriptedPlanner::new(steps);
        let feed = Arc::new(FakeFeed::default());
        let feeds = SportsFeeds {
            nfl: feed.clone(),
            nba: feed.clone(),
            odds: feed,
        };
        let registry = sports_registry(
            &feeds,
            Arc::new(ResponseCache::default()),
            Arc::new(FakeSearch::default()),
            Duration::from_secs(5),
        )
        .unwrap();
        let config = AgentConfig {
            max_iterations: 2,
            ..AgentConfig::default()
        };
        let agent = Agent::new("sports", config, planner, Arc::new(registry));
        let result = agent.execute(AgentRequest::new("loop"), None).await;
        assert!(!result.success);
        let trace = result.trace.unwrap();
        assert_eq!(trace["iterations"], 2);
        assert!(result.error.unwrap().contains("planning turns"));
    }
}
