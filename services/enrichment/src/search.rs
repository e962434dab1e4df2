//! Search request shaping and make/model matching.

use market_data::ListingQuery;
use serde::Deserialize;
use types::listing::Listing;

pub const DEFAULT_ROWS: u32 = 50;

/// Fallback search parameters applied to empty request fields.
#[derive(Debug, Clone)]
pub struct SearchDefaults {
    pub make: String,
    pub model: String,
    pub zip: String,
    pub radius: u32,
    pub rows: u32,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            make: "ford".to_string(),
            model: "f-150".to_string(),
            zip: "92617".to_string(),
            radius: 50,
            rows: DEFAULT_ROWS,
        }
    }
}

impl SearchDefaults {
    /// # Environment Variables
    /// - `SEARCH_MAKE` (default: ford)
    /// - `SEARCH_MODEL` (default: f-150)
    /// - `SEARCH_ZIP` (default: 92617)
    /// - `SEARCH_RADIUS` (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            make: std::env::var("SEARCH_MAKE").unwrap_or(defaults.make),
            model: std::env::var("SEARCH_MODEL").unwrap_or(defaults.model),
            zip: std::env::var("SEARCH_ZIP").unwrap_or(defaults.zip),
            radius: std::env::var("SEARCH_RADIUS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.radius),
            rows: defaults.rows,
        }
    }
}

/// A listing search as requested by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    pub make: String,
    pub model: String,
    pub zip: String,
    pub radius: u32,
    pub rows: u32,
}

impl SearchCriteria {
    /// Fill empty fields from `defaults`.
    pub fn with_defaults(mut self, defaults: &SearchDefaults) -> Self {
        if self.make.trim().is_empty() {
            self.make = defaults.make.clone();
        }
        if self.model.trim().is_empty() {
            self.model = defaults.model.clone();
        }
        if self.zip.trim().is_empty() {
            self.zip = defaults.zip.clone();
        }
        if self.radius == 0 {
            self.radius = defaults.radius;
        }
        if self.rows == 0 {
            self.rows = defaults.rows;
        }
        self
    }

    /// Provider query for this search. Asks for twice the requested rows so
    /// that enough survive the make/model match.
    pub fn provider_query(&self) -> ListingQuery {
        ListingQuery {
            rows: self.rows.saturating_mul(2),
            make: self.make.clone(),
            model: self.model.clone(),
            zip: self.zip.clone(),
            radius: self.radius,
        }
    }

    /// Keep listings whose embedded make/model match, truncated to `rows`.
    pub fn select(&self, listings: Vec<Listing>) -> Vec<Listing> {
        listings
            .into_iter()
            .filter(|listing| {
                matches_search(&self.make, &listing.build.make)
                    && matches_search(&self.model, &listing.build.model)
            })
            .take(self.rows as usize)
            .collect()
    }
}

/// Lowercase and keep only letters and digits ("F-150" -> "f150").
pub fn normalize_search_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Loose match between a search term and a listing value: either normalized
/// form contains the other. An empty term matches everything.
pub fn matches_search(term: &str, value: &str) -> bool {
    let term = normalize_search_term(term);
    if term.is_empty() {
        return true;
    }
    let value = normalize_search_term(value);
    value.contains(&term) || term.contains(&value)
}
