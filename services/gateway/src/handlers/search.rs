use crate::error::AppError;
use crate::models::{SearchParams, SearchResponse};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use enrichment::SearchCriteria;

pub async fn search_query(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    run_search(&state, params.into_criteria()).await
}

pub async fn search_body(
    State(state): State<AppState>,
    payload: Result<Json<SearchCriteria>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(criteria) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;
    run_search(&state, criteria).await
}

async fn run_search(state: &AppState, criteria: SearchCriteria) -> Result<Json<SearchResponse>, AppError> {
    let criteria = criteria.with_defaults(&state.search_defaults);
    tracing::debug!(
        make = %criteria.make,
        model = %criteria.model,
        zip = %criteria.zip,
        rows = criteria.rows,
        "Searching listings"
    );

    let listings = state.enricher.search(&criteria).await?;
    Ok(Json(SearchResponse::new(listings)))
}
