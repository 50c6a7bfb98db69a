//! Local HTTP job intake.
//!
//! `POST /runsync` runs one job and answers with its envelope;
//! `GET /health` reports liveness.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use comfyrelay_core::job::Job;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handler::handle_job;
use crate::state::WorkerState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    /// Generated when the caller does not supply one.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub id: String,
    pub status: &'static str,
    pub output: Value,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// POST /runsync -- run a job synchronously.
async fn run_sync(State(state): State<WorkerState>, Json(request): Json<RunRequest>) -> Json<RunResponse> {
    let id = request
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let output = handle_job(&state, Job::new(id.clone(), request.input)).await;

    Json(RunResponse {
        id,
        status: "COMPLETED",
        output,
    })
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/runsync", post(run_sync))
        .route("/health", get(health_check))
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
