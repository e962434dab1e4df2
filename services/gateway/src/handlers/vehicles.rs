use crate::error::AppError;
use crate::models::ModelsResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn models_for_make(
    State(state): State<AppState>,
    Path(make): Path<String>,
) -> Result<Json<ModelsResponse>, AppError> {
    let make = make.trim().to_string();
    if make.is_empty() {
        return Err(AppError::BadRequest("make is required".into()));
    }

    let models = state.catalog.models_for_make(&make).await?;
    if models.is_empty() {
        return Err(AppError::NotFound(format!("No models found for make {}", make)));
    }

    Ok(Json(ModelsResponse { make, models }))
}
