use crate::rate_limit::RateLimiter;
use enrichment::{Enricher, SearchDefaults};
use market_data::ModelCatalog;
use persistence::{ListingRepository, PriceStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub rate_limiter: Arc<RateLimiter>,
    pub enricher: Enricher,
    pub search_defaults: Arc<SearchDefaults>,
    pub catalog: Arc<dyn ModelCatalog>,
    pub prices: Arc<dyn PriceStore>,
    pub listings: Arc<dyn ListingRepository>,
}
