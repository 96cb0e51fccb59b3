//! NBA tools: daily schedule and injuries, game summaries, seasonal
//! statistics and the team list.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cache::ResponseCache;
use super::client::{arg_i64, arg_id, arg_str, fetch_cached, League, SportsFeed};
use super::types::{summarize_games, GameSummary, TeamRef};
use crate::error::{ClientError, ToolError};
use crate::tools::{InputSchema, ParamKind, ToolAdapter, ToolDefinition, ToolRegistry};

pub const DAILY_SCHEDULE: &str = "get_daily_schedule";
pub const DAILY_INJURIES: &str = "get_daily_injuries";
pub const GAME_SUMMARY: &str = "get_game_summary";
pub const SEASONAL_STATS: &str = "get_seasonal_stats";
pub const TEAMS_LIST: &str = "get_teams_list";

const SCHEDULE_TTL: Duration = Duration::from_secs(12 * 3600);
const TEAMS_TTL: Duration = Duration::from_secs(24 * 3600);

/// Result of `get_daily_schedule`; `games[].id` feeds `get_game_summary`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailySchedule {
    pub date: String,
    pub games: Vec<GameSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InjuredPlayer {
    pub full_name: String,
    pub position: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamInjuries {
    pub name: String,
    pub alias: Option<String>,
    pub players: Vec<InjuredPlayer>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InjuryReport {
    pub date: String,
    pub teams: Vec<TeamInjuries>,
}

/// Validated calendar date from the `year`/`month`/`day` arguments.
pub fn date_from_args(args: &Value) -> Result<NaiveDate, ClientError> {
    let year = arg_i64(args, "year")?;
    let month = arg_i64(args, "month")?;
    let day = arg_i64(args, "day")?;
    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d));
    date.ok_or_else(|| ClientError::InvalidRequest(format!("not a calendar date: {}-{}-{}", year, month, day)))
}

fn date_path(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

pub fn summarize_injuries(date: NaiveDate, raw: &Value) -> InjuryReport {
    let teams = raw
        .get("teams")
        .and_then(|v| v.as_array())
        .map(|teams| teams.iter().filter_map(team_injuries).collect())
        .unwrap_or_default();
    InjuryReport {
        date: date.to_string(),
        teams,
    }
}

fn team_injuries(team: &Value) -> Option<TeamInjuries> {
    let text = |v: &Value, key: &str| v.get(key).and_then(|s| s.as_str()).map(|s| s.to_string());
    let players = team
        .get("players")
        .and_then(|v| v.as_array())
        .map(|players| {
            players
                .iter()
                .filter_map(|player| {
                    let latest = player.pointer("/injuries/0").unwrap_or(&Value::Null);
                    Some(InjuredPlayer {
                        full_name: text(player, "full_name")?,
                        position: text(player, "position"),
                        status: text(latest, "status"),
                        description: text(latest, "desc"),
                        comment: text(latest, "comment"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(TeamInjuries {
        name: text(team, "name")?,
        alias: text(team, "alias"),
        players,
    })
}

#[derive(Clone, Copy, Debug)]
enum NbaOp {
    DailySchedule,
    DailyInjuries,
    GameSummary,
    SeasonalStats,
    TeamsList,
}

struct NbaTool {
    op: NbaOp,
    feed: Arc<dyn SportsFeed>,
    cache: Arc<ResponseCache>,
}

#[async_trait]
impl ToolAdapter for NbaTool {
    async fn call(&self, args: &Value) -> Result<Value, ClientError> {
        let payload = match self.op {
            NbaOp::DailySchedule => {
                let date = date_from_args(args)?;
                let endpoint = format!("games/{}/schedule.json", date_path(date));
                let raw = fetch_cached(self.feed.as_ref(), &self.cache, League::Nba, &endpoint, SCHEDULE_TTL).await?;
                serde_json::to_value(DailySchedule {
                    date: date.to_string(),
                    games: summarize_games(raw.get("games")),
                })
            }
            NbaOp::DailyInjuries => {
                let date = date_from_args(args)?;
                let endpoint = format!("league/{}/daily_injuries.json", date_path(date));
                let raw = self.feed.fetch(&endpoint).await?;
                serde_json::to_value(summarize_injuries(date, &raw))
            }
            NbaOp::GameSummary => {
                let id = arg_id(args, "game_id")?;
                return self.feed.fetch(&format!("games/{}/summary.json", id)).await;
            }
            NbaOp::SeasonalStats => {
                let year = arg_i64(args, "season_year")?;
                let season_type = arg_str(args, "season_type")?.to_uppercase();
                let team_id = arg_id(args, "team_id")?;
                let endpoint = format!("seasons/{}/{}/teams/{}/statistics.json", year, season_type, team_id);
                return self.feed.fetch(&endpoint).await;
            }
            NbaOp::TeamsList => {
                let raw = fetch_cached(self.feed.as_ref(), &self.cache, League::Nba, "league/teams.json", TEAMS_TTL).await?;
                let teams: Vec<TeamRef> = raw
                    .get("teams")
                    .and_then(|v| v.as_array())
                    .map(|teams| teams.iter().filter_map(TeamRef::from_value).collect())
                    .unwrap_or_default();
                Ok(serde_json::json!({ "teams": teams }))
            }
        };
        payload.map_err(|err| ClientError::Decode(err.to_string()))
    }
}

fn date_schema() -> InputSchema {
    InputSchema::new()
        .required("year", ParamKind::Integer { min: 1946, max: 2100 }, "Year, e.g. 2024.")
        .required("month", ParamKind::Integer { min: 1, max: 12 }, "Month number, 1-12.")
        .required("day", ParamKind::Integer { min: 1, max: 31 }, "Day of month, 1-31.")
        .calendar_date("year", "month", "day")
}

pub fn register(registry: &ToolRegistry, feed: Arc<dyn SportsFeed>, cache: Arc<ResponseCache>) -> Result<(), ToolError> {
    let tools = [
        (
            NbaOp::DailySchedule,
            ToolDefinition::new(
                DAILY_SCHEDULE,
                "Fetches the NBA schedule for a date. Returns game ids required by get_game_summary. Injuries for the same date are fetched automatically.",
                date_schema(),
            ),
        ),
        (
            NbaOp::DailyInjuries,
            ToolDefinition::new(DAILY_INJURIES, "Fetches the NBA injury report for a date.", date_schema()),
        ),
        (
            NbaOp::GameSummary,
            ToolDefinition::new(
                GAME_SUMMARY,
                "Fetches the summary of one NBA game: scores, team stats and players.",
                InputSchema::new().required("game_id", ParamKind::Identifier, "Game id from get_daily_schedule."),
            ),
        ),
        (
            NbaOp::SeasonalStats,
            ToolDefinition::new(
                SEASONAL_STATS,
                "Fetches team and player seasonal statistics for an NBA team.",
                InputSchema::new()
                    .required("season_year", ParamKind::Integer { min: 1946, max: 2100 }, "Season start year, e.g. 2024.")
                    .required(
                        "season_type",
                        ParamKind::Choice(vec!["REG".to_string(), "PRE".to_string(), "PST".to_string()]),
                        "REG, PRE or PST.",
                    )
                    .required("team_id", ParamKind::Identifier, "Team id from get_teams_list."),
            ),
        ),
        (
            NbaOp::TeamsList,
            ToolDefinition::new(TEAMS_LIST, "Lists all NBA teams with names, aliases and ids.", InputSchema::new()),
        ),
    ];
    for (op, definition) in tools {
        registry.register(
            definition,
            Arc::new(NbaTool {
                op,
                feed: feed.clone(),
                cache: cache.clone(),
            }),
        )?;
    }
    Ok(())
}
