//! Persistence Service
//!
//! Durable storage for price history and enriched listings:
//! - `PriceStore`: append/upsert price points keyed by (VIN, timestamp) and
//!   read back a VIN's full history in chronological order
//! - `ListingRepository`: upsert enriched listings keyed by VIN, look them up
//!   by VIN, and page through them by make/model
//!
//! Two backends implement both traits: an in-process `MemoryStore` and a
//! PostgreSQL `PostgresStore` that keeps listing payloads in JSONB columns.

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::{StoreBackend, StoreConfig};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{ListingFilters, ListingRepository, PriceStore, StoreError};

use std::sync::Arc;

/// Both store handles, backed by the same backend.
#[derive(Clone)]
pub struct Stores {
    pub prices: Arc<dyn PriceStore>,
    pub listings: Arc<dyn ListingRepository>,
}

impl Stores {
    /// Open the configured backend. For PostgreSQL this connects and
    /// bootstraps the schema, so failure here means the store is unreachable.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match config.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data will not survive a restart");
                Ok(Self::from_shared(Arc::new(MemoryStore::new())))
            }
            StoreBackend::Postgres => {
                let store = PostgresStore::connect(config).await?;
                tracing::info!("Connected to PostgreSQL database");
                Ok(Self::from_shared(Arc::new(store)))
            }
        }
    }

    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: PriceStore + ListingRepository + 'static,
    {
        Self {
            prices: store.clone(),
            listings: store,
        }
    }
}
