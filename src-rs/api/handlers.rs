use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use super::models::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ErrorBody, ModelCard, ModelList, ResearchRequest,
    RunsQuery,
};
use crate::agent::{Agent, AgentRequest};
use crate::helpers::Agents;
use crate::llm::LLMRouter;
use crate::runs::RunStore;

const DEFAULT_RUNS_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub sports: Arc<Agent>,
    pub research: Arc<Agent>,
    pub router: Arc<LLMRouter>,
    pub runs: Arc<RunStore>,
}

impl From<Agents> for AppState {
    fn from(agents: Agents) -> Self {
        Self {
            sports: agents.sports,
            research: agents.research,
            router: agents.router,
            runs: agents.runs,
        }
    }
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(kind, message))).into_response()
}

fn data_event(payload: &impl Serialize) -> Event {
    Event::default().data(serde_json::to_string(payload).unwrap_or_default())
}

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_models(State(state): State<AppState>) -> Json<ModelList> {
    let data = state
        .router
        .models()
        .iter()
        .map(|info| ModelCard {
            id: info.id.clone(),
            object: "model",
            owned_by: info.owned_by.clone(),
        })
        .collect();
    Json(ModelList { object: "list", data })
}

pub async fn handle_runs(State(state): State<AppState>, Query(query): Query<RunsQuery>) -> Json<serde_json::Value> {
    let limit = query.limit.unwrap_or(DEFAULT_RUNS_LIMIT);
    Json(json!({"runs": state.runs.list(limit)}))
}

pub async fn handle_run(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.runs.get(&id) {
        Some(run) => Json(run).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", format!("no run {}", id)),
    }
}

pub async fn handle_research(State(state): State<AppState>, Json(req): Json<ResearchRequest>) -> Response {
    if req.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request_error", "query required");
    }
    let result = state.research.execute(AgentRequest::new(&req.query), None).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(result)).into_response()
}

pub async fn handle_chat_completions(
    State(state): State<AppState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Response {
    let (query, context) = match req.split_query() {
        Some(parts) => parts,
        None => return error_response(StatusCode::BAD_REQUEST, "invalid_request_error", "a user message is required"),
    };
    if let Some(model) = &req.model {
        if state.router.provider_for_model(model).is_none() {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                format!("unknown model: {}", model),
            );
        }
    }
    let model = req.model.clone().unwrap_or_else(|| state.sports.config.model.clone());
    let request = AgentRequest::new(&query)
        .with_context(context)
        .with_model(req.model.clone());
    let completion_id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
    info!(stream = req.stream, model = %model, "chat completion requested");

    if !req.stream {
        let result = state.sports.execute(request, None).await;
        if result.success {
            return Json(ChatCompletion::new(&completion_id, &model, result.output)).into_response();
        }
        let message = result.error.unwrap_or_else(|| "agent failed".to_string());
        return error_response(StatusCode::BAD_GATEWAY, "agent_error", message);
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let agent = state.sports.clone();
    tokio::spawn(async move {
        let (token_tx, mut token_rx) = mpsc::unbounded_channel::<String>();
        let _ = event_tx.send(data_event(&ChatCompletionChunk::role(&completion_id, &model)));

        let run = agent.execute(request, Some(token_tx));
        tokio::pin!(run);
        let result = loop {
            tokio::select! {
                Some(token) = token_rx.recv() => {
                    let _ = event_tx.send(data_event(&ChatCompletionChunk::content(&completion_id, &model, token)));
                }
                result = &mut run => break result,
            }
        };
        while let Ok(token) = token_rx.try_recv() {
            let _ = event_tx.send(data_event(&ChatCompletionChunk::content(&completion_id, &model, token)));
        }

        if result.success {
            let _ = event_tx.send(data_event(&ChatCompletionChunk::stop(&completion_id, &model)));
        } else {
            let message = result.error.unwrap_or_else(|| "agent failed".to_string());
            warn!(session = %result.session_id, "streamed session failed: {}", message);
            let _ = event_tx.send(data_event(&ErrorBody::new("agent_error", message)));
        }
        let _ = event_tx.send(Event::default().data("[DONE]"));
    });

    let stream = UnboundedReceiverStream::new(event_rx).map(Ok::<Event, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
