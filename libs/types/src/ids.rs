//! Identifier types for vehicle entities
//!
//! The VIN is the join key across the build cache, price history and
//! persisted listings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TypesError;

/// Vehicle identification number
///
/// Opaque to this system: the only requirement is that it is non-empty once
/// trimmed. Provider records with a blank VIN deserialize to the empty value
/// and are rejected where a key is required. Deserialization trims the same
/// way `new` does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Vin(String);

impl Vin {
    /// Create a VIN from a string, trimming surrounding whitespace
    pub fn new(vin: impl Into<String>) -> Self {
        let vin = vin.into();
        Self(vin.trim().to_string())
    }

    /// Create a VIN, rejecting empty input
    pub fn parse(vin: &str) -> Result<Self, TypesError> {
        let vin = Self::new(vin);
        if vin.is_empty() {
            return Err(TypesError::EmptyVin);
        }
        Ok(vin)
    }

    /// Get the VIN as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Vin {
    fn from(vin: String) -> Self {
        Self::new(vin)
    }
}

impl From<Vin> for String {
    fn from(vin: Vin) -> Self {
        vin.0
    }
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Vin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
