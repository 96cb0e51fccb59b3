use chrono::NaiveDate;

pub const SPORTS_SYSTEM_PROMPT: &str = "You are a sports betting research assistant covering the NFL and NBA. \
Answer with facts from the tools, never from memory.

Rules:
- Odds: call get_daily_schedule_odds first, then get_sport_event_markets with a sport_event_id from its result.
- NFL games: call find_game_by_teams_and_date first, then get_game_statistics or get_game_roster with its game_id. \
get_team_season_stats needs only a team name and may be called alongside.
- NBA games: call get_daily_schedule first; injuries for that date are added automatically. \
Use get_game_summary only with a game id from the schedule.
- Never invent identifiers. If a call is refused, obtain the identifier and try again.
- When you have enough information, answer without calling more tools.";

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a sports research analyst. Use web_search to gather current news \
and betting angles, then write a concise briefing with sources.";

pub const FINAL_ANSWER_PROMPT: &str = "Using the tool results above, write the final answer to the user's question. \
Do not call tools.";

/// Query the daily trigger sends to the research agent.
pub const DAILY_RESEARCH_QUERY: &str = "Summarize today's top NBA news and the latest NBA betting news.";

/// System prompt with the date and any identifiers already collected.
pub fn planner_system_prompt(base: &str, today: NaiveDate, known_ids: &str) -> String {
    let mut prompt = format!(
        "{}\n\nFor context, today's date is {}.",
        base,
        today.format("%A, %B %d, %Y")
    );
    if !known_ids.is_empty() {
        prompt.push_str("\n\nIdentifiers returned so far in this session:\n");
        prompt.push_str(known_ids);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_date_and_ids() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 5).unwrap();
        let prompt = planner_system_prompt("base", today, "- from get_daily_schedule_odds: 12345");
        assert!(prompt.contains("Thursday, September 05, 2024"));
        assert!(prompt.ends_with("12345"));
        assert!(!planner_system_prompt("base", today, "").contains("Identifiers"));
    }
}
