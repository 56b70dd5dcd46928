//! Route definitions for job observation, mounted at `/jobs`.
//!
//! ```text
//! GET /{id}              get_job
//! GET /{id}/events       job_events (SSE)
//! GET /{id}/extension    extension_capability
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/events", get(jobs::job_events))
        .route("/{id}/extension", get(jobs::extension_capability))
}
