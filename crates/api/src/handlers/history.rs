//! Handlers for the persistent generation history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genstudio_core::error::CoreError;
use genstudio_core::job::JobKind;
use genstudio_core::types::RecordId;
use genstudio_store::models::{HistoryFilter, PageRequest};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub kind: Option<JobKind>,
    pub limit: Option<usize>,
    pub cursor: Option<usize>,
}

/// Result of a bulk clear.
#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub deleted: usize,
}

// ---------------------------------------------------------------------------
// GET /history
// ---------------------------------------------------------------------------

/// List completed jobs, newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = HistoryFilter { kind: params.kind };
    let page = state
        .history
        .list(filter, PageRequest::new(params.limit, params.cursor))
        .await;

    tracing::debug!(count = page.items.len(), total = page.total, "Listed history");

    Ok(Json(DataResponse { data: page }))
}

// ---------------------------------------------------------------------------
// GET /history/{id}
// ---------------------------------------------------------------------------

pub async fn get_history_item(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> AppResult<impl IntoResponse> {
    let item = state
        .history
        .get(id)
        .await
        .ok_or_else(|| CoreError::not_found("HistoryItem", id))?;
    Ok(Json(DataResponse { data: item }))
}

// ---------------------------------------------------------------------------
// DELETE /history/{id}
// ---------------------------------------------------------------------------

pub async fn delete_history_item(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> AppResult<StatusCode> {
    if state.history.delete(id).await? {
        tracing::info!(record_id = %id, "History item deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("HistoryItem", id).into())
    }
}

// ---------------------------------------------------------------------------
// DELETE /history
// ---------------------------------------------------------------------------

/// Remove all history records, or only those of `?kind=`.
pub async fn clear_history(
    State(state): State<AppState>,
    Query(filter): Query<HistoryFilter>,
) -> AppResult<impl IntoResponse> {
    let deleted = state.history.clear(filter).await?;
    tracing::info!(deleted, kind = ?filter.kind, "History cleared");
    Ok(Json(DataResponse {
        data: ClearedResponse { deleted },
    }))
}
