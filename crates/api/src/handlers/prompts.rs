use axum::extract::State;
use axum::Json;

use crate::engine::{EnhancePrompt, EnhancedPrompt};
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /prompts/enhance -- rewrite a short prompt into a detailed one.
pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(input): Json<EnhancePrompt>,
) -> AppResult<Json<DataResponse<EnhancedPrompt>>> {
    let enhanced = state.engine.enhance_prompt(input).await?;
    Ok(Json(DataResponse { data: enhanced }))
}
