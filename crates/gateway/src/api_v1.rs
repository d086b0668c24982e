//! HTTP API v1 — the browser front-end's backend.
//!
//! Endpoints:
//!
//! - `GET  /v1/session`      — selected model, model options, history
//! - `POST /v1/model`        — apply a model option
//! - `POST /v1/chat/stream`  — send a message, get an SSE stream of the turn

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use vicagent_agent::{AgentStreamEvent, Session, TurnOutcome};
use vicagent_config::MODEL_OPTIONS;
use vicagent_core::message::Role;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub session: RwLock<Session>,
}

impl ApiV1State {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/session", get(session_handler))
        .route("/model", post(apply_model_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelDto {
    pub label: String,
    pub supports_thinking: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessageDto {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub model: String,
    pub thinking: bool,
    pub models: Vec<ModelDto>,
    pub history_size: usize,
    pub history: Vec<HistoryMessageDto>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyModelRequest {
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyModelResponse {
    pub model: String,
    pub thinking: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn session_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session.read().await;
    let history_size = session
        .history_size()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let history = session
        .history()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?
        .into_iter()
        .filter(|m| m.is_dialogue())
        .map(|m| HistoryMessageDto {
            role: m.role,
            content: m.content,
        })
        .collect();

    Ok(Json(SessionResponse {
        model: session.model().label.to_string(),
        thinking: session.agent().thinking_enabled(),
        models: MODEL_OPTIONS
            .iter()
            .map(|m| ModelDto {
                label: m.label.to_string(),
                supports_thinking: m.supports_thinking,
            })
            .collect(),
        history_size,
        history,
    }))
}

async fn apply_model_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ApplyModelRequest>,
) -> Result<Json<ApplyModelResponse>, ApiError> {
    let mut session = state.session.write().await;
    let option = session
        .select_model(&payload.model)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(ApplyModelResponse {
        model: option.label.to_string(),
        thinking: session.agent().thinking_enabled(),
    }))
}

/// `POST /v1/chat/stream` — one turn as SSE.
///
/// Each `AgentStreamEvent` becomes one SSE event named after its type. The
/// turn is saved to memory when its `done` event passes through.
async fn chat_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    info!(message_len = message.len(), "Chat turn received");

    let mut agent_rx = state
        .session
        .read()
        .await
        .send(&message)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let (tx, rx) = mpsc::channel::<AgentStreamEvent>(128);
    let forward_state = state.clone();
    tokio::spawn(async move {
        while let Some(event) = agent_rx.recv().await {
            if let Some(outcome) = TurnOutcome::from_event(&event)
                && let Err(e) = forward_state
                    .session
                    .read()
                    .await
                    .complete_turn(&message, &outcome)
                    .await
            {
                warn!(error = %e, "Failed to save turn to memory");
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let event_type = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event_type).data(data))
    });

    Ok(Sse::new(stream))
}
