pub mod cache;
pub mod catalog;
pub mod client;
pub mod nba;
pub mod nfl;
pub mod odds;
pub mod types;

pub use cache::ResponseCache;
pub use catalog::{research_registry, sports_registry, CLEAR_CACHES};
pub use client::{League, SportradarClient, SportsFeed, SportsFeeds};
pub use types::{GameSummary, TeamRef};
