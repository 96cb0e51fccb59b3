pub mod history;
pub mod ledger;
pub mod state;
pub mod types;

pub use history::{History, HistoryEntry};
pub use ledger::IdentifierLedger;
pub use state::SessionState;
pub use types::Session;
