use axum::extract::{Path, State};
use axum::http::StatusCode;
use genstudio_core::types::SessionId;

use crate::error::AppResult;
use crate::state::AppState;

/// DELETE /sessions/{id} -- end an editing session immediately.
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> AppResult<StatusCode> {
    state.engine.close_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
