//! Dependency rules between sports tools: which identifiers a call needs,
//! where they come from, and which calls the orchestrator adds on its own.

use serde_json::{json, Value};

use crate::error::SessionError;
use crate::session::{History, IdentifierLedger};
use crate::sports::{nba, nfl, odds};
use crate::tools::{canonical_id, ToolCall, ToolResult};

/// `tool(arg)` only accepts identifiers previously returned by `source`.
#[derive(Clone, Copy, Debug)]
pub struct DependencyRule {
    pub tool: &'static str,
    pub arg: &'static str,
    pub source: &'static str,
}

pub const DEPENDENCY_RULES: [DependencyRule; 4] = [
    DependencyRule {
        tool: odds::SPORT_EVENT_MARKETS,
        arg: "sport_event_id",
        source: odds::DAILY_SCHEDULE_ODDS,
    },
    DependencyRule {
        tool: nfl::GAME_STATISTICS,
        arg: "game_id",
        source: nfl::FIND_GAME,
    },
    DependencyRule {
        tool: nfl::GAME_ROSTER,
        arg: "game_id",
        source: nfl::FIND_GAME,
    },
    DependencyRule {
        tool: nba::GAME_SUMMARY,
        arg: "game_id",
        source: nba::DAILY_SCHEDULE,
    },
];

/// Refuses `call` when it names an identifier the ledger has not seen from
/// the required source. Missing arguments are left to schema validation.
pub fn check_dependency(call: &ToolCall, ledger: &IdentifierLedger) -> Result<(), SessionError> {
    for rule in DEPENDENCY_RULES.iter().filter(|rule| rule.tool == call.name) {
        let value = match call.identifier_arg(rule.arg) {
            Some(value) => value,
            None => continue,
        };
        if !ledger.contains(rule.source, &value) {
            return Err(SessionError::MissingDependency {
                tool: call.name.clone(),
                needed: format!("{} from {}", rule.arg, rule.source),
                value,
            });
        }
    }
    Ok(())
}

/// Identifiers a successful result makes available to later calls.
pub fn harvest(result: &ToolResult) -> Vec<String> {
    let output = match (&result.output, result.success) {
        (Some(output), true) => output,
        _ => return Vec::new(),
    };
    match result.tool.as_str() {
        nfl::FIND_GAME => output.get("game_id").and_then(canonical_id).into_iter().collect(),
        nba::DAILY_SCHEDULE => ids_in(output.get("games")),
        odds::DAILY_SCHEDULE_ODDS => ids_in(output.get("sport_events")),
        _ => Vec::new(),
    }
}

fn ids_in(list: Option<&Value>) -> Vec<String> {
    list.and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|item| item.get("id").and_then(canonical_id)).collect())
        .unwrap_or_default()
}

/// Calls the orchestrator issues after `call` succeeded, whatever the planner
/// asked for. A successful NBA schedule always pulls that day's injuries.
pub fn follow_ups(call: &ToolCall, result: &ToolResult) -> Vec<ToolCall> {
    if !result.success {
        return Vec::new();
    }
    injuries_for(call).into_iter().collect()
}

fn injuries_for(call: &ToolCall) -> Option<ToolCall> {
    if call.name != nba::DAILY_SCHEDULE {
        return None;
    }
    let date = |key: &str| call.args.get(key).cloned().unwrap_or(Value::Null);
    Some(ToolCall::new(
        nba::DAILY_INJURIES,
        json!({ "year": date("year"), "month": date("month"), "day": date("day") }),
    ))
}

/// Budget slots to hold back for the follow-ups `calls` can trigger. Dates
/// already covered by a successful injuries call, or by an injuries call in
/// the same turn, need none.
pub fn reserved_follow_ups(calls: &[ToolCall], history: &History) -> usize {
    let mut reserved: Vec<ToolCall> = Vec::new();
    for extra in calls.iter().filter_map(injuries_for) {
        let covered = reserved.iter().chain(calls.iter()).any(|other| same_date_call(other, &extra))
            || history
                .entries()
                .iter()
                .any(|entry| entry.result.success && same_date_call(&entry.call, &extra));
        if !covered {
            reserved.push(extra);
        }
    }
    reserved.len()
}

/// Same tool, same date arguments.
pub fn same_date_call(a: &ToolCall, b: &ToolCall) -> bool {
    a.name == b.name
        && ["year", "month", "day"]
            .iter()
            .all(|key| a.args.get(*key) == b.args.get(*key))
}

/// When every NBA schedule lookup of a turn came back empty there is nothing
/// further to plan; returns the explanatory draft answer.
pub fn empty_schedule_draft(turn: &[(ToolCall, ToolResult)]) -> Option<String> {
    let schedules: Vec<&ToolResult> = turn
        .iter()
        .filter(|(call, result)| call.name == nba::DAILY_SCHEDULE && result.success)
        .map(|(_, result)| result)
        .collect();
    if schedules.is_empty() {
        return None;
    }
    let mut dates = Vec::new();
    for result in schedules {
        let output = result.output.as_ref()?;
        let games = output.get("games").and_then(|v| v.as_array())?;
        if !games.is_empty() {
            return None;
        }
        if let Some(date) = output.get("date").and_then(|v| v.as_str()) {
            dates.push(date.to_string());
        }
    }
    Some(format!("No NBA games are scheduled on {}.", dates.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_need_an_odds_schedule_id() {
        let call = ToolCall::new(odds::SPORT_EVENT_MARKETS, json!({"sport_event_id": 12345}));
        let mut ledger = IdentifierLedger::default();
        let err = check_dependency(&call, &ledger).unwrap_err();
        assert!(matches!(err, SessionError::MissingDependency { ref value, .. } if value == "12345"));

        // An id from a different source does not count.
        ledger.record(nba::DAILY_SCHEDULE, vec!["12345".to_string()]);
        assert!(check_dependency(&call, &ledger).is_err());

        ledger.record(odds::DAILY_SCHEDULE_ODDS, vec!["12345".to_string()]);
        assert!(check_dependency(&call, &ledger).is_ok());
    }

    #[test]
    fn independent_tools_and_missing_args_pass() {
        let ledger = IdentifierLedger::default();
        let stats = ToolCall::new(nfl::TEAM_SEASON_STATS, json!({"team_identifier": "KC"}));
        assert!(check_dependency(&stats, &ledger).is_ok());
        let bare = ToolCall::new(nfl::GAME_ROSTER, json!({}));
        assert!(check_dependency(&bare, &ledger).is_ok());
    }

    #[test]
    fn harvests_per_tool_identifiers() {
        let lookup = ToolResult::ok(nfl::FIND_GAME, json!({"status": "ok", "game_id": "gm-1"}));
        assert_eq!(harvest(&lookup), vec!["gm-1"]);
        let miss = ToolResult::ok(nfl::FIND_GAME, json!({"status": "not_found"}));
        assert!(harvest(&miss).is_empty());
        let odds = ToolResult::ok(odds::DAILY_SCHEDULE_ODDS, json!({"sport_events": [{"id": "12345"}, {"id": 7}]}));
        assert_eq!(harvest(&odds), vec!["12345", "7"]);
        let stats = ToolResult::ok(nfl::GAME_STATISTICS, json!({"id": "gm-1"}));
        assert!(harvest(&stats).is_empty());
    }

    #[test]
    fn schedule_pulls_injuries_for_same_date() {
        let call = ToolCall::new(nba::DAILY_SCHEDULE, json!({"year": 2024, "month": 7, "day": 4}));
        let ok = ToolResult::ok(nba::DAILY_SCHEDULE, json!({"games": []}));
        let extra = follow_ups(&call, &ok);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].name, nba::DAILY_INJURIES);
        assert_eq!(extra[0].args, json!({"year": 2024, "month": 7, "day": 4}));
        assert!(follow_ups(&call, &ToolResult::failed(nba::DAILY_SCHEDULE, "x")).is_empty());
    }

    #[test]
    fn reserves_one_slot_per_uncovered_date() {
        let day = |d: u32| ToolCall::new(nba::DAILY_SCHEDULE, json!({"year": 2024, "month": 1, "day": d}));
        let mut history = History::new(24_000);
        assert_eq!(reserved_follow_ups(&[day(1), day(1), day(2)], &history), 2);

        let injuries = ToolCall::new(nba::DAILY_INJURIES, json!({"year": 2024, "month": 1, "day": 1}));
        history.push(
            injuries,
            ToolResult::ok(nba::DAILY_INJURIES, json!({"teams": []})),
            Vec::new(),
            true,
        );
        assert_eq!(reserved_follow_ups(&[day(1), day(2)], &history), 1);
        let search = ToolCall::new("web_search", json!({"query": "nba"}));
        assert_eq!(reserved_follow_ups(&[search], &history), 0);

        let fresh = History::new(24_000);
        let with_injuries = ToolCall::new(nba::DAILY_INJURIES, json!({"year": 2024, "month": 1, "day": 2}));
        assert_eq!(reserved_follow_ups(&[day(2), with_injuries], &fresh), 0);
    }

    #[test]
    fn empty_schedule_only_when_every_lookup_is_empty() {
        let call = ToolCall::new(nba::DAILY_SCHEDULE, json!({}));
        let empty = ToolResult::ok(nba::DAILY_SCHEDULE, json!({"date": "2024-07-04", "games": []}));
        let busy = ToolResult::ok(nba::DAILY_SCHEDULE, json!({"date": "2024-11-02", "games": [{"id": "g1"}]}));

        let draft = empty_schedule_draft(&[(call.clone(), empty.clone())]).unwrap();
        assert!(draft.contains("2024-07-04"));
        assert!(empty_schedule_draft(&[(call.clone(), empty), (call.clone(), busy)]).is_none());
        assert!(empty_schedule_draft(&[]).is_none());
    }
}
