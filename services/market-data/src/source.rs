//! Trait seams for the market-data provider and the model lookup service.

use async_trait::async_trait;
use types::build::BuildSpec;
use types::ids::Vin;
use types::listing::Listing;

use crate::error::ProviderError;

/// Filters for an active-listing search. Empty strings and zero values are
/// treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    pub rows: u32,
    pub make: String,
    pub model: String,
    pub zip: String,
    pub radius: u32,
}

impl ListingQuery {
    pub fn rows(rows: u32) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// Query-string parameters, omitting unset filters.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("rows", self.rows.to_string())];
        if !self.make.is_empty() {
            params.push(("make", self.make.clone()));
        }
        if !self.model.is_empty() {
            params.push(("model", self.model.clone()));
        }
        if !self.zip.is_empty() {
            params.push(("zip", self.zip.clone()));
        }
        if self.radius > 0 {
            params.push(("radius", self.radius.to_string()));
        }
        params
    }
}

/// The external market-data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Active listings matching the query, in provider order.
    async fn active_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, ProviderError>;

    /// A single listing by provider id.
    async fn listing_by_id(&self, id: &str) -> Result<Listing, ProviderError>;

    /// Authoritative build decode for a VIN.
    async fn decode_build(&self, vin: &Vin) -> Result<BuildSpec, ProviderError>;
}

/// The external vehicle-model lookup service.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Sorted, de-duplicated model names offered for `make`.
    async fn models_for_make(&self, make: &str) -> Result<Vec<String>, ProviderError>;
}
