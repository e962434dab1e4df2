//! Market Data clients
//!
//! Outbound collaborators of the enrichment and distribution services:
//! - The market-data provider (active listing search, listing lookup, build decode)
//! - The vehicle-model lookup service (models offered for a make)
//!
//! Callers depend on the [`MarketDataSource`] and [`ModelCatalog`] traits so
//! that the fan-out and the producer loop can run against scripted sources in
//! tests.
//!
//! # Architecture
//!
//! ```text
//!  gateway ──┐                    ┌──► /search/car/active
//!            ├─► MarketDataSource ├──► /listing/car/{id}
//! producer ──┘                    └──► /decode/car/{vin}/specs
//!
//!  gateway ────► ModelCatalog ───────► /vehicles/GetModelsForMake/{make}
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod source;

pub use client::MarketCheckClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use models::NhtsaClient;
pub use source::{ListingQuery, MarketDataSource, ModelCatalog};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
