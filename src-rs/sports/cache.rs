use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::Value;

use super::client::League;

const NFL_CAPACITY: usize = 10;
const NBA_CAPACITY: usize = 128;
const ODDS_CAPACITY: usize = 256;

struct Entry {
    expires_at: Instant,
    value: Value,
}

type Shelf = Mutex<LruCache<String, Entry>>;

fn shelf(capacity: usize) -> Shelf {
    Mutex::new(LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)))
}

/// Time-bounded provider responses, shared by all sessions. Each league has
/// its own LRU so a busy feed cannot push out another's entries.
pub struct ResponseCache {
    nfl: Shelf,
    nba: Shelf,
    odds: Shelf,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_capacities(NFL_CAPACITY, NBA_CAPACITY, ODDS_CAPACITY)
    }
}

impl ResponseCache {
    pub fn with_capacities(nfl: usize, nba: usize, odds: usize) -> Self {
        Self {
            nfl: shelf(nfl),
            nba: shelf(nba),
            odds: shelf(odds),
        }
    }

    fn shelf(&self, league: League) -> &Shelf {
        match league {
            League::Nfl => &self.nfl,
            League::Nba => &self.nba,
            League::Odds => &self.odds,
        }
    }

    fn shelves(&self) -> [&Shelf; 3] {
        [&self.nfl, &self.nba, &self.odds]
    }

    pub fn get(&self, league: League, key: &str) -> Option<Value> {
        let mut cache = self.shelf(league).lock().ok()?;
        match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        cache.pop(key);
        None
    }

    /// Stores `value`; a full shelf evicts its least recently used entry.
    pub fn insert(&self, league: League, key: &str, value: Value, ttl: Duration) {
        if let Ok(mut cache) = self.shelf(league).lock() {
            cache.put(
                key.to_string(),
                Entry {
                    expires_at: Instant::now() + ttl,
                    value,
                },
            );
        }
    }

    /// Drops every entry and returns how many were removed.
    pub fn clear(&self) -> usize {
        self.shelves()
            .into_iter()
            .filter_map(|shelf| shelf.lock().ok())
            .map(|mut cache| {
                let count = cache.len();
                cache.clear();
                count
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.shelves()
            .into_iter()
            .filter_map(|shelf| shelf.lock().ok())
            .map(|cache| cache.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
