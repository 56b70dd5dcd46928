use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use genstudio_core::error::CoreError;
use genstudio_store::StoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StoreError`] for history
/// persistence failures.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `genstudio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A history persistence error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::SessionExpired(msg) => (StatusCode::GONE, "SESSION_EXPIRED", msg.clone()),
                CoreError::Internal(msg) => internal_error(msg),
            },

            // --- Store errors ---
            AppError::Store(err) => internal_error(&err.to_string()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Log the real cause under a fresh error id and hand the client only the id.
fn internal_error(detail: &str) -> (StatusCode, &'static str, String) {
    let error_id = uuid::Uuid::new_v4();
    tracing::error!(%error_id, error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        format!("An internal error occurred (error id {error_id})"),
    )
}
