pub mod generation;
pub mod health;
pub mod history;
pub mod jobs;
pub mod prompts;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /images, /videos, /videos/{id}/extend    generation submissions
/// /jobs/{id}[/events|/extension]           job observation
/// /sessions/{id}                           editing sessions
/// /history[/{id}]                          completed-job history
/// /prompts/enhance                         prompt enhancement
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Image and video submissions.
        .merge(generation::router())
        // Job status, live events and extension capability.
        .nest("/jobs", jobs::router())
        .nest("/sessions", sessions::router())
        .nest("/history", history::router())
        .nest("/prompts", prompts::router())
}
