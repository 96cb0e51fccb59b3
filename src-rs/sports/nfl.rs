//! NFL tools: weekly schedule, game lookup, per-game statistics and rosters,
//! and team season statistics.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cache::ResponseCache;
use super::client::{arg_i64, arg_id, arg_str, fetch_cached, League, SportsFeed};
use super::types::{summarize_games, GameSummary, TeamRef};
use crate::error::{ClientError, ToolError};
use crate::tools::{InputSchema, ParamKind, ToolAdapter, ToolDefinition, ToolRegistry};

pub const CURRENT_WEEK_SCHEDULE: &str = "get_current_week_schedule";
pub const FIND_GAME: &str = "find_game_by_teams_and_date";
pub const GAME_STATISTICS: &str = "get_game_statistics";
pub const GAME_ROSTER: &str = "get_game_roster";
pub const TEAM_SEASON_STATS: &str = "get_team_season_stats";

const CURRENT_WEEK_ENDPOINT: &str = "games/current_week/schedule.json";
const CURRENT_WEEK_TTL: Duration = Duration::from_secs(24 * 3600);

/// (full name, abbreviation, Sportradar team id)
static NFL_TEAMS: [(&str, &str, &str); 32] = [
    ("Arizona Cardinals", "ARI", "de760528-1dc0-416a-a978-b510d20692ff"),
    ("Atlanta Falcons", "ATL", "e6aa13a4-0055-48a9-bc41-be28dc106929"),
    ("Baltimore Ravens", "BAL", "ebd87119-b331-4469-9ea6-d51fe3ce2f1c"),
    ("Buffalo Bills", "BUF", "768c92aa-75ff-4a43-bcc0-f2798c2e1724"),
    ("Carolina Panthers", "CAR", "f14bf5cc-9a82-4a38-bc15-d39f75ed5314"),
    ("Chicago Bears", "CHI", "7b112545-38e6-483c-a55c-96cf6ee49cb8"),
    ("Cincinnati Bengals", "CIN", "ad4ae08f-d808-42d5-a1e6-e9bc4e34d123"),
    ("Cleveland Browns", "CLE", "d5a2eb42-8065-4174-ab79-0a6fa820e35e"),
    ("Dallas Cowboys", "DAL", "e627eec7-bbae-4fa4-8e73-8e1d6bc5c060"),
    ("Denver Broncos", "DEN", "ce92bd47-93d5-4fe9-ada4-0fc681e6caa0"),
    ("Detroit Lions", "DET", "c5a59daa-53a7-4de0-851f-fb12be893e9e"),
    ("Green Bay Packers", "GB", "a20471b4-a8d9-40c7-95ad-90cc30e46932"),
    ("Houston Texans", "HOU", "82d2d380-3834-4938-835f-aec541e5ece7"),
    ("Indianapolis Colts", "IND", "82cf9565-6eb9-4f01-bdbd-5aa0d472fcd9"),
    ("Jacksonville Jaguars", "JAX", "f7ddd7fa-0bae-4f90-bc8e-669e4d6cf2de"),
    ("Kansas City Chiefs", "KC", "6680d28d-d4d2-49f6-aace-5292d3ec02c2"),
    ("Las Vegas Raiders", "LV", "7d4fcc64-9cb5-4d1b-8e75-8a906d1e1576"),
    ("Los Angeles Chargers", "LAC", "1f6dcffb-9823-43cd-9ff4-e7a8466749b5"),
    ("Los Angeles Rams", "LAR", "2eff2a03-54d4-46ba-890e-2bc3925548f3"),
    ("Miami Dolphins", "MIA", "4809ecb0-abd3-451d-9c4a-92a90b83ca06"),
    ("Minnesota Vikings", "MIN", "33405046-04ee-4058-a950-d606f8c30852"),
    ("New England Patriots", "NE", "97354895-8c77-4fd4-a860-32e62ea7382a"),
    ("New Orleans Saints", "NO", "0d855753-ea21-4953-89f9-0e20aff9eb73"),
    ("New York Giants", "NYG", "04aa1c9d-66da-489d-b16a-1dee3f2eec4d"),
    ("New York Jets", "NYJ", "5fee86ae-74ab-4bdd-8416-42a9dd9964f3"),
    ("Philadelphia Eagles", "PHI", "386bdbf9-9eea-4869-bb9a-274b0bc66e80"),
    ("Pittsburgh Steelers", "PIT", "cb2f9f1f-ac67-424e-9e72-1475cb0ed398"),
    ("San Francisco 49ers", "SF", "f0e724b0-4cbf-495a-be47-013907608da9"),
    ("Seattle Seahawks", "SEA", "3d08af9e-c767-4f88-a7dc-b920c6d2b4a8"),
    ("Tampa Bay Buccaneers", "TB", "4254d319-1bc7-4f81-b4ab-b5e6f3402b69"),
    ("Tennessee Titans", "TEN", "d26a1ca5-722d-4274-8f97-c92e49c96315"),
    ("Washington Commanders", "WAS", "22052ff7-c065-42ee-bc8f-c4691c50e624"),
];

fn mascot(full_name: &str) -> &str {
    full_name.rsplit(' ').next().unwrap_or(full_name)
}

fn find_team(query: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let q = query.trim();
    NFL_TEAMS.iter().find(|(name, abbr, _)| {
        name.eq_ignore_ascii_case(q) || abbr.eq_ignore_ascii_case(q) || mascot(name).eq_ignore_ascii_case(q)
    })
}

fn looks_like_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups.iter().map(|g| g.len()).eq([8, 4, 4, 4, 12])
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Full name, mascot or abbreviation (any case), or a raw team UUID.
pub fn resolve_team_id(identifier: &str) -> Option<String> {
    if let Some((_, _, id)) = find_team(identifier) {
        return Some(id.to_string());
    }
    let trimmed = identifier.trim();
    looks_like_uuid(trimmed).then(|| trimmed.to_lowercase())
}

/// Result of `find_game_by_teams_and_date`; `game_id` is the only source of
/// identifiers for the per-game NFL tools.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameLookup {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GameLookup {
    fn found(game: GameSummary) -> Self {
        Self {
            status: "ok".to_string(),
            game_id: Some(game.id.clone()),
            game: Some(game),
            message: None,
        }
    }

    fn not_found(team1: &str, team2: &str, date: NaiveDate) -> Self {
        Self {
            status: "not_found".to_string(),
            game_id: None,
            game: None,
            message: Some(format!("No game found between {} and {} on {}.", team1, team2, date)),
        }
    }
}

fn team_matches(query: &str, team: Option<&TeamRef>) -> bool {
    let team = match team {
        Some(team) => team,
        None => return false,
    };
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return false;
    }
    if team.alias.as_deref().map_or(false, |alias| alias.eq_ignore_ascii_case(&q)) {
        return true;
    }
    let name = team.name.to_lowercase();
    // Known teams compare by full name so short abbreviations ("NE") can't
    // substring-match other names.
    match find_team(&q) {
        Some((full, _, _)) => name.contains(&full.to_lowercase()),
        None => name.contains(&q),
    }
}

fn scheduled_date(game: &GameSummary) -> Option<NaiveDate> {
    let scheduled = game.scheduled.as_deref()?;
    match DateTime::parse_from_rfc3339(scheduled) {
        Ok(dt) => Some(dt.date_naive()),
        Err(_) => scheduled
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()),
    }
}

/// Matches on the game's local calendar date and on team names in either
/// home/away orientation.
pub fn find_game(games: &[GameSummary], team1: &str, team2: &str, date: NaiveDate) -> GameLookup {
    games
        .iter()
        .filter(|game| scheduled_date(game) == Some(date))
        .find(|game| {
            let home = game.home.as_ref();
            let away = game.away.as_ref();
            (team_matches(team1, home) && team_matches(team2, away))
                || (team_matches(team2, home) && team_matches(team1, away))
        })
        .cloned()
        .map(GameLookup::found)
        .unwrap_or_else(|| GameLookup::not_found(team1, team2, date))
}

/// Current-week games live under `week.games`; older payloads put them at the top.
fn week_games(raw: &Value) -> Vec<GameSummary> {
    let games = raw
        .pointer("/week/games")
        .or_else(|| raw.get("games"));
    summarize_games(games)
}

#[derive(Clone, Copy, Debug)]
enum NflOp {
    CurrentWeek,
    FindGame,
    Statistics,
    Roster,
    SeasonStats,
}

struct NflTool {
    op: NflOp,
    feed: Arc<dyn SportsFeed>,
    cache: Arc<ResponseCache>,
}

impl NflTool {
    async fn current_week(&self) -> Result<Value, ClientError> {
        fetch_cached(
            self.feed.as_ref(),
            &self.cache,
            League::Nfl,
            CURRENT_WEEK_ENDPOINT,
            CURRENT_WEEK_TTL,
        )
        .await
    }
}

#[async_trait]
impl ToolAdapter for NflTool {
    async fn call(&self, args: &Value) -> Result<Value, ClientError> {
        let payload = match self.op {
            NflOp::CurrentWeek => {
                let raw = self.current_week().await?;
                Ok(serde_json::json!({
                    "week": raw.pointer("/week/title").or_else(|| raw.pointer("/week/sequence")),
                    "games": week_games(&raw),
                }))
            }
            NflOp::FindGame => {
                let team1 = arg_str(args, "team1")?;
                let team2 = arg_str(args, "team2")?;
                let date = NaiveDate::parse_from_str(arg_str(args, "date")?, "%Y-%m-%d")
                    .map_err(|_| ClientError::InvalidRequest("date must be YYYY-MM-DD".to_string()))?;
                let raw = self.current_week().await?;
                serde_json::to_value(find_game(&week_games(&raw), team1, team2, date))
            }
            NflOp::Statistics => {
                let id = arg_id(args, "game_id")?;
                return self.feed.fetch(&format!("games/{}/statistics.json", id)).await;
            }
            NflOp::Roster => {
                let id = arg_id(args, "game_id")?;
                return self.feed.fetch(&format!("games/{}/roster.json", id)).await;
            }
            NflOp::SeasonStats => {
                let identifier = arg_str(args, "team_identifier")?;
                let team_id = resolve_team_id(identifier).ok_or_else(|| {
                    ClientError::InvalidRequest(format!("could not find a valid team ID for '{}'", identifier))
                })?;
                let year = arg_i64(args, "season_year")?;
                let season_type = arg_str(args, "season_type")?.to_lowercase();
                let endpoint = format!("seasons/{}/{}/teams/{}/statistics.json", year, season_type, team_id);
                return self.feed.fetch(&endpoint).await;
            }
        };
        payload.map_err(|err| ClientError::Decode(err.to_string()))
    }
}

fn season_types() -> ParamKind {
    ParamKind::Choice(vec!["REG".to_string(), "PRE".to_string(), "PST".to_string()])
}

pub fn register(registry: &ToolRegistry, feed: Arc<dyn SportsFeed>, cache: Arc<ResponseCache>) -> Result<(), ToolError> {
    let game_id = || {
        InputSchema::new().required(
            "game_id",
            ParamKind::Identifier,
            "game_id returned by find_game_by_teams_and_date.",
        )
    };
    let tools = [
        (
            NflOp::CurrentWeek,
            ToolDefinition::new(
                CURRENT_WEEK_SCHEDULE,
                "Fetches the NFL schedule for the current week with teams and kickoff times.",
                InputSchema::new(),
            ),
        ),
        (
            NflOp::FindGame,
            ToolDefinition::new(
                FIND_GAME,
                "Finds an NFL game this week by the two teams and the date. Returns the game_id required by get_game_statistics and get_game_roster.",
                InputSchema::new()
                    .required("team1", ParamKind::Text, "First team, e.g. 'Kansas City Chiefs' or 'KC'.")
                    .required("team2", ParamKind::Text, "Second team, e.g. 'Baltimore Ravens'.")
                    .required("date", ParamKind::Date, "Game date in YYYY-MM-DD format."),
            ),
        ),
        (
            NflOp::Statistics,
            ToolDefinition::new(
                GAME_STATISTICS,
                "Fetches team and player statistics for one NFL game.",
                game_id(),
            ),
        ),
        (
            NflOp::Roster,
            ToolDefinition::new(GAME_ROSTER, "Fetches both teams' rosters for one NFL game.", game_id()),
        ),
        (
            NflOp::SeasonStats,
            ToolDefinition::new(
                TEAM_SEASON_STATS,
                "Fetches season statistics for an NFL team. Accepts a full name, mascot, abbreviation or team UUID.",
                InputSchema::new()
                    .required("team_identifier", ParamKind::Text, "Team name, abbreviation or UUID.")
                    .required(
                        "season_year",
                        ParamKind::Integer { min: 1920, max: 2100 },
                        "Season year, e.g. 2024.",
                    )
                    .required("season_type", season_types(), "REG, PRE or PST."),
            ),
        ),
    ];
    for (op, definition) in tools {
        registry.register(
            definition,
            Arc::new(NflTool {
                op,
                feed: feed.clone(),
                cache: cache.clone(),
            }),
        )?;
    }
    Ok(())
}
