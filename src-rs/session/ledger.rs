use std::collections::{BTreeMap, BTreeSet};

/// Identifiers harvested from successful results, keyed by the tool that
/// produced them. Lives beside the history so compaction never loses an id.
#[derive(Clone, Debug, Default)]
pub struct IdentifierLedger {
    by_source: BTreeMap<String, BTreeSet<String>>,
}

impl IdentifierLedger {
    pub fn record(&mut self, source: &str, ids: impl IntoIterator<Item = String>) {
        let entry = self.by_source.entry(source.to_string()).or_default();
        entry.extend(ids);
    }

    pub fn contains(&self, source: &str, id: &str) -> bool {
        self.by_source
            .get(source)
            .map_or(false, |ids| ids.contains(id))
    }

    pub fn ids_from(&self, source: &str) -> Vec<String> {
        self.by_source
            .get(source)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.values().all(|ids| ids.is_empty())
    }

    /// One line per source tool, for the planner prompt.
    pub fn render(&self) -> String {
        self.by_source
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(source, ids)| {
                let joined: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
                format!("- from {}: {}", source, joined.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_scoped_by_source() {
        let mut ledger = IdentifierLedger::default();
        assert!(ledger.is_empty());
        ledger.record("get_daily_schedule_odds", vec!["12345".to_string()]);
        ledger.record("get_daily_schedule", vec!["g1".to_string(), "g2".to_string()]);
        assert!(ledger.contains("get_daily_schedule_odds", "12345"));
        assert!(!ledger.contains("get_daily_schedule", "12345"));
        assert_eq!(ledger.ids_from("get_daily_schedule"), vec!["g1", "g2"]);
        assert_eq!(
            ledger.render(),
            "- from get_daily_schedule: g1, g2\n- from get_daily_schedule_odds: 12345"
        );
    }
}
