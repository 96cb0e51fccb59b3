use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{
    handle_chat_completions, handle_health, handle_models, handle_research, handle_run, handle_runs, AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/research", post(handle_research))
        .route("/runs", get(handle_runs))
        .route("/runs/:id", get(handle_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct AgentServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl AgentServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Serves until `shutdown` resolves.
    pub async fn start(&self, shutdown: impl Future<Output = ()>) -> Result<(), String> {
        let app = router(self.state.clone());
        info!("listening on {}", self.addr);
        axum::Server::bind(&self.addr)
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| err.to_string())
    }
}
