use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use reki_agent_rs::error::ClientError;
use reki_agent_rs::llm::ProviderError;
use reki_agent_rs::planner::{PlanStep, Planner, TokenSink};
use reki_agent_rs::runs::{RunStatus, RunStore};
use reki_agent_rs::search::{SearchApi, SearchHit};
use reki_agent_rs::session::Session;
use reki_agent_rs::sports::{nba, nfl, odds, sports_registry, ResponseCache, SportsFeed, SportsFeeds};
use reki_agent_rs::tools::ToolCall;
use reki_agent_rs::{Agent, AgentConfig, AgentRequest};

#[derive(Default)]
struct StubFeed {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<String>>,
}

impl StubFeed {
    fn with(mut self, endpoint: &str, body: Value) -> Self {
        self.responses.insert(endpoint.to_string(), body);
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SportsFeed for StubFeed {
    async fn fetch(&self, endpoint: &str) -> Result<Value, ClientError> {
        self.requests.lock().unwrap().push(endpoint.to_string());
        self.responses.get(endpoint).cloned().ok_or(ClientError::Http {
            status: 404,
            body: endpoint.to_string(),
        })
    }
}

struct StubSearch;

#[async_trait]
impl SearchApi for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ClientError> {
        Ok(vec![SearchHit {
            title: format!("About {}", query),
            url: "https://example.com/news".to_string(),
            snippet: "Latest lines.".to_string(),
        }])
    }
}

type Step = Box<dyn Fn(&Session) -> PlanStep + Send + Sync>;

/// Each step sees the session so far, the way a model sees its prompt.
struct StepPlanner {
    steps: Mutex<Vec<Step>>,
}

impl StepPlanner {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps),
        })
    }
}

#[async_trait]
impl Planner for StepPlanner {
    async fn plan(&self, session: &Session) -> Result<PlanStep, ProviderError> {
        let mut steps = self.steps.lock().unwrap();
        if steps.is_empty() {
            return Err(ProviderError::new("exhausted", "planner ran out of steps", false));
        }
        let step = steps.remove(0);
        Ok(step(session))
    }

    async fn finalize(&self, _session: &Session, draft: &str, sink: Option<&TokenSink>) -> Result<String, ProviderError> {
        if let Some(sink) = sink {
            let _ = sink.send(draft.to_string());
        }
        Ok(draft.to_string())
    }
}

fn step(f: impl Fn(&Session) -> PlanStep + Send + Sync + 'static) -> Step {
    Box::new(f)
}

fn calls(list: Vec<ToolCall>) -> Step {
    Box::new(move |_| PlanStep::CallTools(list.clone()))
}

fn answer(text: &str) -> Step {
    let text = text.to_string();
    Box::new(move |_| PlanStep::Finalize(text.clone()))
}

fn agent(feed: Arc<StubFeed>, planner: Arc<StepPlanner>, runs: Arc<RunStore>) -> Agent {
    let feeds = SportsFeeds {
        nfl: feed.clone(),
        nba: feed.clone(),
        odds: feed,
    };
    let registry = sports_registry(
        &feeds,
        Arc::new(ResponseCache::default()),
        Arc::new(StubSearch),
        Duration::from_secs(5),
    )
    .unwrap();
    Agent::new("sports", AgentConfig::default(), planner, Arc::new(registry)).with_runs(runs)
}

#[tokio::test]
async fn chiefs_ravens_odds_use_schedule_event_id() {
    let feed = Arc::new(
        StubFeed::default()
            .with(
                "sports/sr:sport:16/schedules/2024-09-05/schedules.json",
                json!({"sport_events": [{
                    "id": 12345,
                    "start_time": "2024-09-06T00:20:00+00:00",
                    "competitors": [
                        {"name": "Kansas City Chiefs", "qualifier": "home"},
                        {"name": "Baltimore Ravens", "qualifier": "away"}
                    ]
                }]}),
            )
            .with(
                "sport_events/12345/sport_event_markets.json",
                json!({"markets": [
                    {"name": "2way", "books": []},
                    {"name": "moneyline", "books": [{"name": "Book", "outcomes": [
                        {"type": "home", "odds_american": "-125"}
                    ]}]}
                ]}),
            ),
    );
    let planner = StepPlanner::new(vec![
        calls(vec![ToolCall::new(odds::SPORT_EVENT_MARKETS, json!({"sport_event_id": "999"}))]),
        calls(vec![ToolCall::new(
            odds::DAILY_SCHEDULE_ODDS,
            json!({"sport_name": "NFL", "date": "2024-09-05"}),
        )]),
        step(|session| {
            let id = session.ledger().ids_from(odds::DAILY_SCHEDULE_ODDS)[0].clone();
            PlanStep::CallTools(vec![ToolCall::new(odds::SPORT_EVENT_MARKETS, json!({ "sport_event_id": id }))])
        }),
        answer("Chiefs -125 on the moneyline."),
    ]);
    let runs = Arc::new(RunStore::default());
    let agent = agent(feed.clone(), planner, runs.clone());

    let result = agent
        .execute(AgentRequest::new("What are the odds for Chiefs vs Ravens on 2024-09-05?"), None)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.output, "Chiefs -125 on the moneyline.");

    let requested = feed.requested();
    assert!(requested.contains(&"sport_events/12345/sport_event_markets.json".to_string()));
    assert!(!requested.iter().any(|endpoint| endpoint.contains("999")));

    let trace = result.trace.unwrap();
    assert_eq!(trace["tool_calls"], 3);
    assert_eq!(trace["calls"][0]["success"], false);
    assert_eq!(trace["calls"][2]["success"], true);
    assert_eq!(runs.get(&result.session_id).unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn empty_nba_date_still_checks_injuries() {
    let feed = Arc::new(
        StubFeed::default()
            .with("games/2024/07/04/schedule.json", json!({"date": "2024-07-04", "games": []}))
            .with("league/2024/07/04/daily_injuries.json", json!({"teams": []})),
    );
    let planner = StepPlanner::new(vec![calls(vec![ToolCall::new(
        nba::DAILY_SCHEDULE,
        json!({"year": 2024, "month": 7, "day": 4}),
    )])]);
    let agent = agent(feed.clone(), planner, Arc::new(RunStore::default()));

    let result = agent.execute(AgentRequest::new("Any NBA games on July 4th 2024?"), None).await;
    assert!(result.success, "{:?}", result.error);
    assert!(result.output.contains("No NBA games"));
    assert_eq!(
        feed.requested(),
        vec!["games/2024/07/04/schedule.json", "league/2024/07/04/daily_injuries.json"]
    );
}

#[tokio::test]
async fn injuries_are_not_refetched_for_the_same_date() {
    let feed = Arc::new(
        StubFeed::default()
            .with(
                "games/2024/11/02/schedule.json",
                json!({"games": [{"id": "g1", "scheduled": "2024-11-02T23:00:00Z",
                    "home": {"name": "Boston Celtics"}, "away": {"name": "Denver Nuggets"}}]}),
            )
            .with("league/2024/11/02/daily_injuries.json", json!({"teams": []}))
            .with("games/g1/summary.json", json!({"id": "g1", "status": "closed"})),
    );
    let schedule = ToolCall::new(nba::DAILY_SCHEDULE, json!({"year": 2024, "month": 11, "day": 2}));
    let planner = StepPlanner::new(vec![
        calls(vec![schedule.clone()]),
        calls(vec![schedule, ToolCall::new(nba::GAME_SUMMARY, json!({"game_id": "g1"}))]),
        answer("Celtics won."),
    ]);
    let agent = agent(feed.clone(), planner, Arc::new(RunStore::default()));

    let result = agent.execute(AgentRequest::new("How did the Celtics do on Nov 2?"), None).await;
    assert!(result.success, "{:?}", result.error);
    let injuries = feed
        .requested()
        .iter()
        .filter(|endpoint| endpoint.ends_with("daily_injuries.json"))
        .count();
    assert_eq!(injuries, 1);
    assert_eq!(result.trace.unwrap()["tool_calls"], 4);
}

#[tokio::test]
async fn nfl_stats_need_a_found_game() {
    let feed = Arc::new(
        StubFeed::default()
            .with(
                "games/current_week/schedule.json",
                json!({"week": {"title": "1", "games": [{
                    "id": "gm-1",
                    "scheduled": "2024-09-05T20:20:00+00:00",
                    "status": "scheduled",
                    "home": {"name": "Kansas City Chiefs", "alias": "KC"},
                    "away": {"name": "Baltimore Ravens", "alias": "BAL"}
                }]}}),
            )
            .with("games/gm-1/statistics.json", json!({"id": "gm-1", "statistics": {}})),
    );
    let planner = StepPlanner::new(vec![
        calls(vec![ToolCall::new(nfl::GAME_STATISTICS, json!({"game_id": "gm-1"}))]),
        calls(vec![ToolCall::new(
            nfl::FIND_GAME,
            json!({"team1": "Ravens", "team2": "KC", "date": "2024-09-05"}),
        )]),
        calls(vec![ToolCall::new(nfl::GAME_STATISTICS, json!({"game_id": "gm-1"}))]),
        answer("Stats attached."),
    ]);
    let agent = agent(feed.clone(), planner, Arc::new(RunStore::default()));

    let result = agent.execute(AgentRequest::new("Chiefs Ravens stats"), None).await;
    assert!(result.success, "{:?}", result.error);
    let stats_fetches = feed
        .requested()
        .iter()
        .filter(|endpoint| endpoint.ends_with("statistics.json"))
        .count();
    assert_eq!(stats_fetches, 1);
}

#[tokio::test]
async fn feed_failure_fails_session() {
    let feed = Arc::new(StubFeed::default());
    let planner = StepPlanner::new(vec![calls(vec![ToolCall::new(
        nba::DAILY_SCHEDULE,
        json!({"year": 2024, "month": 7, "day": 4}),
    )])]);
    let runs = Arc::new(RunStore::default());
    let agent = agent(feed, planner, runs.clone());

    let result = agent.execute(AgentRequest::new("NBA July 4"), None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains(nba::DAILY_SCHEDULE));
    assert_eq!(result.trace.unwrap()["state"], "failed");
    let run = runs.get(&result.session_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn web_search_and_budget_share_the_session() {
    let planner = StepPlanner::new(vec![
        calls((0..6).map(|i| ToolCall::new("web_search", json!({"query": format!("q{}", i)}))).collect()),
        calls((0..5).map(|i| ToolCall::new("web_search", json!({"query": format!("r{}", i)}))).collect()),
    ]);
    let agent = agent(Arc::new(StubFeed::default()), planner, Arc::new(RunStore::default()));

    let result = agent.execute(AgentRequest::new("betting news"), None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("budget"));
    let trace = result.trace.unwrap();
    assert_eq!(trace["tool_calls"], 6);
    assert_eq!(trace["calls"].as_array().unwrap().len(), 6);
}
