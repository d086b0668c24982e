//! HTTP gateway for VicAgent.
//!
//! Serves the embedded browser front-end, a health check, and the v1 API
//! the front-end talks to (session, model selection, streamed chat).
//!
//! Built on Axum.

pub mod api_v1;
pub mod frontend;

use axum::extract::DefaultBodyLimit;
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use vicagent_agent::Session;
use vicagent_config::AppConfig;

pub use api_v1::{ApiV1State, SharedApiState};

/// Build the full router: front-end, health, and v1 API.
///
/// Layers applied:
/// - CORS allowing the gateway's own origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedApiState, config: &AppConfig) -> Router {
    let origin = format!("http://{}:{}", config.gateway.host, config.gateway.port);
    let cors = match origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => CorsLayer::new(),
    }
    .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
    .allow_headers([axum::http::header::CONTENT_TYPE])
    .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .merge(frontend::frontend_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server with a session built from `config`.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let session = Session::from_config(config.clone()).await?;
    info!(model = %session.model(), "Session ready");
    let state = Arc::new(ApiV1State::new(session));

    let app = build_router(state, &config);

    info!(addr = %addr, "Gateway listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
