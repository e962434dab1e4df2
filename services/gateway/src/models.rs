use enrichment::SearchCriteria;
use persistence::ListingFilters;
use serde::{Deserialize, Serialize};
use types::pricing::EnrichedListing;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

/// Query-string form of a search. Numbers arrive as text so that a malformed
/// `radius` or `rows` falls back to the default instead of failing the call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub make: String,
    pub model: String,
    pub zip: String,
    pub radius: String,
    pub rows: String,
}

impl SearchParams {
    pub fn into_criteria(self) -> SearchCriteria {
        SearchCriteria {
            make: self.make,
            model: self.model,
            zip: self.zip,
            radius: self.radius.trim().parse().unwrap_or(0),
            rows: self.rows.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub listings: Vec<EnrichedListing>,
    pub count: usize,
}

impl SearchResponse {
    pub fn new(listings: Vec<EnrichedListing>) -> Self {
        Self {
            count: listings.len(),
            listings,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingParams {
    pub make: String,
    pub model: String,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListingParams {
    pub fn into_filters(self) -> ListingFilters {
        ListingFilters {
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingsResponse {
    pub listings: Vec<EnrichedListing>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub make: String,
    pub models: Vec<String>,
}
