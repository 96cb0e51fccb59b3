pub mod agent;
pub mod config;
pub mod error;
pub mod helpers;
pub mod planner;
pub mod prompts;
pub mod result;
pub mod retry;
pub mod scheduler;
pub mod search;
pub mod workflow;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "tools/lib.rs"]
pub mod tools;
#[path = "sports/lib.rs"]
pub mod sports;
#[path = "session/lib.rs"]
pub mod session;
#[path = "runs/lib.rs"]
pub mod runs;
#[path = "api/lib.rs"]
pub mod api;

pub use agent::{Agent, AgentRequest};
pub use config::{AgentConfig, AppConfig};
pub use result::AgentResult;
