//! Route definitions for editing sessions, mounted at `/sessions`.
//!
//! ```text
//! DELETE /{id}    close_session
//! ```

use axum::routing::delete;
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", delete(sessions::close_session))
}
