pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::AppState;
pub use server::{router, AgentServer};
