//! Route definitions for prompt tooling, mounted at `/prompts`.
//!
//! ```text
//! POST /enhance    enhance_prompt
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::prompts;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/enhance", post(prompts::enhance_prompt))
}
