//! Handlers for submitting generation work.
//!
//! Every submission answers `202 Accepted` with the new job id as soon as
//! the job is registered; the generation itself runs in the background.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genstudio_core::params::VideoParams;
use genstudio_core::types::JobId;

use crate::engine::{ExtendVideo, SubmitImage};
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /images
// ---------------------------------------------------------------------------

/// Generate images, or edit within an existing session when the body
/// carries a `session_id`.
pub async fn submit_image(
    State(state): State<AppState>,
    Json(input): Json<SubmitImage>,
) -> AppResult<impl IntoResponse> {
    let submission = state.engine.submit_image(input)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// POST /videos
// ---------------------------------------------------------------------------

pub async fn submit_video(
    State(state): State<AppState>,
    Json(params): Json<VideoParams>,
) -> AppResult<impl IntoResponse> {
    let submission = state.engine.submit_video(params)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// POST /videos/{id}/extend
// ---------------------------------------------------------------------------

/// Continue a completed 720p video with one more segment.
pub async fn extend_video(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Json(input): Json<ExtendVideo>,
) -> AppResult<impl IntoResponse> {
    let submission = state.engine.extend_video(id, input.prompt)?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}
