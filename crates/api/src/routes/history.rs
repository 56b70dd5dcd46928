//! Route definitions for generation history, mounted at `/history`.
//!
//! ```text
//! GET    /        list_history (?kind, limit, cursor)
//! DELETE /        clear_history (?kind)
//! GET    /{id}    get_history_item
//! DELETE /{id}    delete_history_item
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::history;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(history::list_history).delete(history::clear_history),
        )
        .route(
            "/{id}",
            get(history::get_history_item).delete(history::delete_history_item),
        )
}
