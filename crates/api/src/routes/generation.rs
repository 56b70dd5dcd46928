//! Route definitions for generation submissions.
//!
//! ```text
//! POST /images                 submit_image
//! POST /videos                 submit_video
//! POST /videos/{id}/extend     extend_video
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", post(generation::submit_image))
        .route("/videos", post(generation::submit_video))
        .route("/videos/{id}/extend", post(generation::extend_video))
}
