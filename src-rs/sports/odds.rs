//! Pre-match odds comparison: daily schedules and per-event markets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cache::ResponseCache;
use super::client::{arg_id, arg_str, fetch_cached, League, SportsFeed};
use crate::error::{ClientError, ToolError};
use crate::tools::{canonical_id, InputSchema, ParamKind, ToolAdapter, ToolDefinition, ToolRegistry};

pub const DAILY_SCHEDULE_ODDS: &str = "get_daily_schedule_odds";
pub const SPORT_EVENT_MARKETS: &str = "get_sport_event_markets";

const SCHEDULE_TTL: Duration = Duration::from_secs(3600);
const TARGET_MARKETS: [&str; 3] = ["moneyline", "spread", "total"];

/// Accepted sport names mapped to (canonical name, provider sport id).
const SPORTS: [(&str, &str, &str); 4] = [
    ("nfl", "american_football", "sr:sport:16"),
    ("american_football", "american_football", "sr:sport:16"),
    ("nba", "basketball", "sr:sport:2"),
    ("basketball", "basketball", "sr:sport:2"),
];

pub fn resolve_sport(name: &str) -> Option<(&'static str, &'static str)> {
    let lowered = name.trim().to_lowercase();
    SPORTS
        .iter()
        .find(|(alias, _, _)| *alias == lowered)
        .map(|(_, canonical, id)| (*canonical, *id))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SportEventSummary {
    pub id: String,
    pub start_time: Option<String>,
    pub competitors: Vec<String>,
}

/// Result of `get_daily_schedule_odds`; every `sport_events[].id` is a valid
/// input for `get_sport_event_markets`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OddsSchedule {
    pub sport: String,
    pub date: String,
    pub sport_events: Vec<SportEventSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub odds_decimal: Option<Value>,
    pub odds_american: Option<Value>,
    pub total: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    pub outcomes: Vec<Outcome>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub name: String,
    pub books: Vec<Book>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMarkets {
    pub sport_event_id: String,
    pub markets: Vec<Market>,
}

/// The provider has shipped both a flat `sport_events` list and a
/// `schedules[].sport_event` wrapper; accept either.
pub fn summarize_schedule(sport: &str, date: &str, raw: &Value) -> OddsSchedule {
    let mut events: Vec<&Value> = Vec::new();
    if let Some(list) = raw.get("sport_events").and_then(|v| v.as_array()) {
        events.extend(list.iter());
    }
    if let Some(list) = raw.get("schedules").and_then(|v| v.as_array()) {
        events.extend(list.iter().filter_map(|s| s.get("sport_event")));
    }

    let sport_events = events
        .into_iter()
        .filter_map(|event| {
            let id = event.get("id").and_then(canonical_id)?;
            let competitors = event
                .get("competitors")
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                        .map(|n| n.to_string())
                        .collect()
                })
                .unwrap_or_default();
            Some(SportEventSummary {
                id,
                start_time: event
                    .get("start_time")
                    .or_else(|| event.get("scheduled"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                competitors,
            })
        })
        .collect();

    OddsSchedule {
        sport: sport.to_string(),
        date: date.to_string(),
        sport_events,
    }
}

/// Keeps moneyline, spread and total markets with slimmed book records.
pub fn filter_markets(sport_event_id: &str, raw: &Value) -> EventMarkets {
    let markets = raw
        .get("markets")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|market| {
                    let name = market.get("name").and_then(|v| v.as_str())?;
                    let lowered = name.to_lowercase();
                    if !TARGET_MARKETS.iter().any(|target| lowered.contains(target)) {
                        return None;
                    }
                    Some(Market {
                        name: name.to_string(),
                        books: slim_books(market),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    EventMarkets {
        sport_event_id: sport_event_id.to_string(),
        markets,
    }
}

fn slim_books(market: &Value) -> Vec<Book> {
    let books = match market.get("books").and_then(|v| v.as_array()) {
        Some(books) => books,
        None => return Vec::new(),
    };
    books
        .iter()
        .map(|book| Book {
            name: book
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            outcomes: book
                .get("outcomes")
                .and_then(|v| v.as_array())
                .map(|outcomes| {
                    outcomes
                        .iter()
                        .map(|o| Outcome {
                            kind: o.get("type").cloned(),
                            odds_decimal: o.get("odds_decimal").cloned(),
                            odds_american: o.get("odds_american").cloned(),
                            total: o.get("total").cloned(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

#[derive(Clone, Copy, Debug)]
enum OddsOp {
    DailySchedule,
    EventMarkets,
}

struct OddsTool {
    op: OddsOp,
    feed: Arc<dyn SportsFeed>,
    cache: Arc<ResponseCache>,
}

#[async_trait]
impl ToolAdapter for OddsTool {
    async fn call(&self, args: &Value) -> Result<Value, ClientError> {
        let payload = match self.op {
            OddsOp::DailySchedule => {
                let requested = arg_str(args, "sport_name")?;
                let (sport, sport_id) = resolve_sport(requested)
                    .ok_or_else(|| ClientError::InvalidRequest(format!("invalid sport name: {}", requested)))?;
                let date = arg_str(args, "date")?;
                let endpoint = format!("sports/{}/schedules/{}/schedules.json", sport_id, date);
                let raw = fetch_cached(self.feed.as_ref(), &self.cache, League::Odds, &endpoint, SCHEDULE_TTL).await?;
                serde_json::to_value(summarize_schedule(sport, date, &raw))
            }
            OddsOp::EventMarkets => {
                let id = arg_id(args, "sport_event_id")?;
                let endpoint = format!("sport_events/{}/sport_event_markets.json", id);
                let raw = self.feed.fetch(&endpoint).await?;
                serde_json::to_value(filter_markets(&id, &raw))
            }
        };
        payload.map_err(|err| ClientError::Decode(err.to_string()))
    }
}

pub fn register(registry: &ToolRegistry, feed: Arc<dyn SportsFeed>, cache: Arc<ResponseCache>) -> Result<(), ToolError> {
    let sports = vec![
        "NFL".to_string(),
        "NBA".to_string(),
        "american_football".to_string(),
        "basketball".to_string(),
    ];
    registry.register(
        ToolDefinition::new(
            DAILY_SCHEDULE_ODDS,
            "Lists the scheduled events with odds coverage for a sport on a date. Returns sport_event_id values required by get_sport_event_markets.",
            InputSchema::new()
                .required("sport_name", ParamKind::Choice(sports), "Sport: NFL or NBA.")
                .required("date", ParamKind::Date, "Date in YYYY-MM-DD format."),
        ),
        Arc::new(OddsTool {
            op: OddsOp::DailySchedule,
            feed: feed.clone(),
            cache: cache.clone(),
        }),
    )?;
    registry.register(
        ToolDefinition::new(
            SPORT_EVENT_MARKETS,
            "Fetches moneyline, spread and total markets for one event. Only use a sport_event_id returned by get_daily_schedule_odds.",
            InputSchema::new().required(
                "sport_event_id",
                ParamKind::Identifier,
                "sport_event_id from get_daily_schedule_odds.",
            ),
        ),
        Arc::new(OddsTool {
            op: OddsOp::EventMarkets,
            feed,
            cache,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sports::client::testing::FakeFeed;
    use crate::tools::ToolCall;
    use serde_json::json;

    #[test]
    fn resolves_sport_aliases() {
        assert_eq!(resolve_sport("NFL"), Some(("american_football", "sr:sport:16")));
        assert_eq!(resolve_sport("Basketball"), Some(("basketball", "sr:sport:2")));
        assert_eq!(resolve_sport("cricket"), None);
    }

    #[test]
    fn schedule_accepts_both_shapes() {
        let flat = json!({"sport_events": [{"id": 12345, "start_time": "2024-09-05T20:20:00+00:00",
            "competitors": [{"name": "Kansas City Chiefs"}, {"name": "Baltimore Ravens"}]}]});
        let summary = summarize_schedule("american_football", "2024-09-05", &flat);
        assert_eq!(summary.sport_events[0].id, "12345");
        assert_eq!(summary.sport_events[0].competitors.len(), 2);

        let wrapped = json!({"schedules": [{"sport_event": {"id": "sr:sport_event:9", "scheduled": "x"}}]});
        let summary = summarize_schedule("basketball", "2024-11-02", &wrapped);
        assert_eq!(summary.sport_events[0].id, "sr:sport_event:9");
        assert_eq!(summary.sport_events[0].start_time.as_deref(), Some("x"));
    }

    #[test]
    fn markets_filtered_to_targets() {
        let raw = json!({"markets": [
            {"name": "Moneyline", "books": [{"name": "Book A", "id": "b1",
                "outcomes": [{"type": "home", "odds_decimal": "1.80", "odds_american": "-125", "extra": 1}]}]},
            {"name": "Spread (incl. overtime)", "books": []},
            {"name": "First touchdown scorer", "books": []},
            {"name": "Total", "books": [{"name": "Book B", "outcomes": [{"type": "over", "total": "46.5"}]}]}
        ]});
        let filtered = filter_markets("12345", &raw);
        let names: Vec<&str> = filtered.markets.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Moneyline", "Spread (incl. overtime)", "Total"]);
        let outcome = &filtered.markets[0].books[0].outcomes[0];
        assert_eq!(outcome.odds_american, Some(json!("-125")));
        let rendered = serde_json::to_value(outcome).unwrap();
        assert_eq!(rendered["type"], "home");
        assert!(rendered.get("extra").is_none());
    }

    #[tokio::test]
    async fn tools_hit_expected_endpoints() {
        let feed = Arc::new(
            FakeFeed::default()
                .with(
                    "sports/sr:sport:16/schedules/2024-09-05/schedules.json",
                    Ok(json!({"sport_events": [{"id": 12345}]})),
                )
                .with(
                    "sport_events/12345/sport_event_markets.json",
                    Ok(json!({"markets": [{"name": "moneyline", "books": []}]})),
                ),
        );
        let registry = ToolRegistry::new();
        register(&registry, feed.clone(), Arc::new(ResponseCache::default())).unwrap();

        let schedule = registry
            .invoke(&ToolCall::new(DAILY_SCHEDULE_ODDS, json!({"sport_name": "NFL", "date": "2024-09-05"})))
            .await
            .unwrap();
        assert_eq!(schedule.output.unwrap()["sport_events"][0]["id"], "12345");

        let markets = registry
            .invoke(&ToolCall::new(SPORT_EVENT_MARKETS, json!({"sport_event_id": 12345})))
            .await
            .unwrap();
        assert_eq!(markets.output.unwrap()["markets"][0]["name"], "moneyline");
        assert_eq!(feed.requested().len(), 2);
    }
}
