//! Handlers for observing jobs.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use genstudio_core::types::JobId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /jobs/{id} -- current snapshot of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.engine.get_status(id)?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /jobs/{id}/events -- SSE stream of job snapshots.
///
/// One `job` event per observed change; the stream closes after the
/// terminal snapshot. Disconnecting stops the watch, not the job.
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let watch = state.engine.watch(id)?;
    tracing::debug!(job_id = %id, "Job event stream opened");

    let stream = watch.into_stream().map(|job| {
        let event = Event::default()
            .event("job")
            .json_data(&job)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
        Ok(event)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /jobs/{id}/extension -- whether the video can be extended further.
pub async fn extension_capability(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let capability = state.engine.extension_capability(id)?;
    Ok(Json(DataResponse { data: capability }))
}
