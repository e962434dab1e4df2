//! Types library for the motor-metrics services
//!
//! This library provides the core type definitions shared by the provider
//! client, the enrichment path, the stores and the distribution pipeline.
//!
//! # Modules
//! - `ids`: Vehicle identifier (Vin)
//! - `build`: Decoded build specification
//! - `listing`: Raw provider listing records
//! - `pricing`: Price points, valuations and enriched listings
//! - `valuation`: Valuation estimators
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod build;
pub mod listing;
pub mod pricing;
pub mod valuation;
pub mod errors;
