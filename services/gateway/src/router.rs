use crate::handlers::{health, listings, search, vehicles};
use crate::rate_limit::limit_by_client;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    // Only search spends provider quota, so only search is rate limited.
    let search_routes = Router::new()
        .route("/search", get(search::search_query).post(search::search_body))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            limit_by_client,
        ));

    let api_routes = Router::new()
        .merge(search_routes)
        .route("/listings", get(listings::list_listings))
        .route("/listings/{vin}", get(listings::get_listing))
        .route("/models/{make}", get(vehicles::models_for_make));

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
