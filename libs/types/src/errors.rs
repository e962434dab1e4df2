//! Error types for the shared domain model

use thiserror::Error;

/// Validation errors raised while constructing domain values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypesError {
    #[error("VIN must not be empty")]
    EmptyVin,

    #[error("Listing {listing_id} has no VIN")]
    MissingVin { listing_id: String },
}
