//! Price history and enriched listing types
//!
//! Price points are append-only per VIN. A `Valuation` is never a source of
//! truth: it is recomputed from history whenever history changes.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::build::BuildSpec;
use crate::ids::Vin;
use crate::listing::Listing;

/// A single observed price for a vehicle
///
/// `date` travels as unix seconds, the provider's history format, and is
/// truncated to whole seconds on construction so a point compares equal to
/// itself after a round trip through the broker or a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(price: i64, date: DateTime<Utc>) -> Self {
        Self {
            price,
            date: date.with_nanosecond(0).unwrap_or(date),
        }
    }
}

/// Good-value verdict and numeric score for a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub is_good_value: bool,
    /// Fractional deviation below the reference price (positive = cheaper)
    pub score: f64,
}

/// A listing joined with its build, price history and valuation
///
/// This is the unit of serialization on the distribution topic and the unit
/// of persistence. `price_history` is in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichedListing {
    pub listing: Listing,
    pub build: BuildSpec,
    pub price_history: Vec<PricePoint>,
    pub valuation: Valuation,
}

impl EnrichedListing {
    /// Build a record seeded with a single observation of the current price.
    pub fn seeded(
        listing: Listing,
        build: BuildSpec,
        observed_at: DateTime<Utc>,
        valuation: Valuation,
    ) -> Self {
        let seed = PricePoint::new(listing.price, observed_at);
        Self {
            listing,
            build,
            price_history: vec![seed],
            valuation,
        }
    }

    pub fn vin(&self) -> &Vin {
        &self.listing.vin
    }
}
