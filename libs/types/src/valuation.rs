//! Valuation estimators
//!
//! Two distinct estimators, selected by what data is available:
//!
//! - [`compute_valuation`]: historical-average estimator. Used whenever a
//!   price history exists (the distribution consumer recomputes it over the
//!   full accumulated history for a VIN).
//! - [`msrp_valuation`]: MSRP estimator. Used at first enrichment, when no
//!   history has been accumulated yet.
//!
//! They are not interchangeable; both are pure and deterministic.

use crate::pricing::{PricePoint, Valuation};

/// Score above which a listing counts as a good value (5% below reference).
pub const GOOD_VALUE_THRESHOLD: f64 = 0.05;

/// Value a current price against the mean of a price history.
///
/// `score = (mean - current) / mean`. Empty history, or a history whose mean
/// is zero, yields the default (not good, score 0).
pub fn compute_valuation(history: &[PricePoint], current_price: i64) -> Valuation {
    if history.is_empty() {
        return Valuation::default();
    }

    let sum: f64 = history.iter().map(|p| p.price as f64).sum();
    let avg = sum / history.len() as f64;
    if avg == 0.0 {
        return Valuation::default();
    }

    let score = (avg - current_price as f64) / avg;
    Valuation {
        is_good_value: score > GOOD_VALUE_THRESHOLD,
        score,
    }
}

/// Value a price against the listing's MSRP.
pub fn msrp_valuation(price: i64, msrp: i64) -> Valuation {
    if msrp <= 0 {
        return Valuation::default();
    }

    Valuation {
        is_good_value: price < msrp,
        score: (msrp - price) as f64 / msrp as f64,
    }
}
