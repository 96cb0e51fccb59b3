use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::canonical_id;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl TeamRef {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            id: value.get("id").and_then(canonical_id),
            name: value.get("name").and_then(|v| v.as_str())?.to_string(),
            alias: value.get("alias").and_then(|v| v.as_str()).map(|s| s.to_string()),
        })
    }
}

/// Slim view of one scheduled game. `id` is the game identifier the per-game
/// tools accept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub id: String,
    pub scheduled: Option<String>,
    pub status: Option<String>,
    pub home: Option<TeamRef>,
    pub away: Option<TeamRef>,
}

impl GameSummary {
    pub fn from_value(game: &Value) -> Option<Self> {
        Some(Self {
            id: game.get("id").and_then(canonical_id)?,
            scheduled: str_field(game, "scheduled"),
            status: str_field(game, "status"),
            home: game.get("home").and_then(TeamRef::from_value),
            away: game.get("away").and_then(TeamRef::from_value),
        })
    }
}

pub fn summarize_games(games: Option<&Value>) -> Vec<GameSummary> {
    games
        .and_then(|v| v.as_array())
        .map(|list| list.iter().filter_map(GameSummary::from_value).collect())
        .unwrap_or_default()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}
