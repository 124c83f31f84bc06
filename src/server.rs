//! HTTP server for ticket submission.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/submit-ticket` | Run a ticket through the pipeline |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! Success:
//!
//! ```json
//! { "message": "Ticket processed successfully", "response": "..." }
//! ```
//!
//! Any pipeline failure is a `500` carrying the stage error's message. A body
//! that is not a valid ticket gets a 4xx with the same shape:
//!
//! ```json
//! { "detail": "Embedding error: embedding API error 401 Unauthorized: ..." }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser forms can
//! post tickets directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::SupportTicket;
use crate::pipeline::Pipeline;

pub const SUCCESS_MESSAGE: &str = "Ticket processed successfully";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Starts the server with collaborator clients built from `config`.
///
/// Binds to `[server].bind` and runs until the process receives Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    tracing::info!(
        index = config.index.name.as_deref().unwrap_or("-"),
        backend = %config.index.backend,
        embedding_model = %pipeline.embedding_model(),
        completion_model = %config.completion.model,
        "pipeline ready"
    );
    run_server_with_pipeline(&config.server.bind, pipeline).await
}

/// Starts the server around an already-built [`Pipeline`].
pub async fn run_server_with_pipeline(bind: &str, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("ticket server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Builds the application router.
pub fn router(pipeline: Pipeline) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/submit-ticket", post(handle_submit_ticket))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Request failures, all rendered as `{"detail": ...}`.
enum AppError {
    /// Body was not a valid ticket; keeps axum's 400/415/422 status.
    InvalidTicket(JsonRejection),
    /// A pipeline stage failed: 500.
    Pipeline(PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::InvalidTicket(rejection) => (rejection.status(), rejection.body_text()),
            AppError::Pipeline(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /submit-ticket ============

#[derive(Serialize)]
struct SubmitResponse {
    message: String,
    response: String,
}

/// Handler for `POST /submit-ticket`.
///
/// Each request drives its own pipeline run; nothing is shared between
/// requests except the collaborator clients.
async fn handle_submit_ticket(
    State(state): State<AppState>,
    payload: Result<Json<SupportTicket>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(ticket) = payload.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "rejected ticket payload");
        AppError::InvalidTicket(rejection)
    })?;

    let processed = state.pipeline.process(&ticket).await.map_err(|e| {
        tracing::error!(stage = %e.stage(), error = %e, "ticket processing failed");
        AppError::Pipeline(e)
    })?;

    Ok(Json(SubmitResponse {
        message: SUCCESS_MESSAGE.to_string(),
        response: processed.response,
    }))
}
