use crate::error::AppError;
use crate::models::{ListingParams, ListingsResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use types::ids::Vin;
use types::pricing::EnrichedListing;

/// A stored listing with its full price history attached.
pub async fn get_listing(
    State(state): State<AppState>,
    Path(vin): Path<String>,
) -> Result<Json<EnrichedListing>, AppError> {
    let vin = Vin::parse(&vin).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut listing = state
        .listings
        .listing(&vin)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No listing for VIN {}", vin)))?;

    listing.price_history = state.prices.history(&vin).await?;
    Ok(Json(listing))
}

pub async fn list_listings(
    State(state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<ListingsResponse>, AppError> {
    let listings = state.listings.listings(&params.into_filters()).await?;
    Ok(Json(ListingsResponse {
        count: listings.len(),
        listings,
    }))
}
