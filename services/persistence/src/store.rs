//! Store traits shared by every backend

use async_trait::async_trait;
use thiserror::Error;
use types::ids::Vin;
use types::pricing::{EnrichedListing, PricePoint};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Pool configuration error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

// ── Filters ─────────────────────────────────────────────────────────

/// Filters for listing queries. Empty strings and zero limits mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFilters {
    pub make: String,
    pub model: String,
    pub limit: usize,
    pub offset: usize,
}

// ── Traits ──────────────────────────────────────────────────────────

/// Append-only price history per VIN.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Record a price point. Idempotent on (VIN, timestamp): a repeated
    /// timestamp replaces the price instead of adding a point.
    async fn add_price(&self, vin: &Vin, point: PricePoint) -> Result<(), StoreError>;

    /// Full history for a VIN, ascending by timestamp.
    async fn history(&self, vin: &Vin) -> Result<Vec<PricePoint>, StoreError>;
}

/// Enriched listings keyed by VIN.
///
/// Stored records carry listing, build and valuation. Price history lives in
/// the `PriceStore`; records read back from here have an empty history.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Insert or replace the record for the listing's VIN.
    async fn save_listing(&self, listing: &EnrichedListing) -> Result<(), StoreError>;

    async fn listing(&self, vin: &Vin) -> Result<Option<EnrichedListing>, StoreError>;

    /// Records matching the filters, most recently updated first.
    async fn listings(&self, filters: &ListingFilters) -> Result<Vec<EnrichedListing>, StoreError>;
}
