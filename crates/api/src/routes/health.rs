use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Generation backend in use.
    pub provider: &'static str,
    /// Jobs currently held in the registry, terminal ones included.
    pub jobs: usize,
    /// Jobs still pending or processing.
    pub active_jobs: usize,
    pub sessions: usize,
}

/// GET /health -- service liveness plus engine occupancy.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = &state.engine;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: engine.provider().name(),
        jobs: engine.registry().len(),
        active_jobs: engine.registry().active_count(),
        sessions: engine.sessions().len(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
