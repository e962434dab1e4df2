//! In-process store implementing both store traits
//!
//! A single readers-writer lock per map serializes concurrent appends for
//! the same VIN, so a history read always sees a consistent sequence.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use types::ids::Vin;
use types::pricing::{EnrichedListing, PricePoint};

use crate::store::{ListingFilters, ListingRepository, PriceStore, StoreError};

struct StoredListing {
    record: EnrichedListing,
    /// Monotonic write counter standing in for `updated_at`.
    revision: u64,
}

#[derive(Default)]
struct ListingTable {
    rows: HashMap<Vin, StoredListing>,
    next_revision: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    prices: RwLock<HashMap<Vin, BTreeMap<DateTime<Utc>, i64>>>,
    listings: RwLock<ListingTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored listings.
    pub fn listing_count(&self) -> usize {
        self.listings.read().rows.len()
    }
}

fn require_vin(vin: &Vin) -> Result<(), StoreError> {
    if vin.is_empty() {
        return Err(StoreError::InvalidRecord("VIN must not be empty".into()));
    }
    Ok(())
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn add_price(&self, vin: &Vin, point: PricePoint) -> Result<(), StoreError> {
        require_vin(vin)?;
        self.prices
            .write()
            .entry(vin.clone())
            .or_default()
            .insert(point.date, point.price);
        Ok(())
    }

    async fn history(&self, vin: &Vin) -> Result<Vec<PricePoint>, StoreError> {
        let prices = self.prices.read();
        Ok(prices
            .get(vin)
            .map(|points| {
                points
                    .iter()
                    .map(|(date, price)| PricePoint::new(*price, *date))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn save_listing(&self, listing: &EnrichedListing) -> Result<(), StoreError> {
        require_vin(listing.vin())?;

        let mut record = listing.clone();
        record.price_history.clear();

        let mut table = self.listings.write();
        table.next_revision += 1;
        let revision = table.next_revision;
        table
            .rows
            .insert(listing.vin().clone(), StoredListing { record, revision });
        Ok(())
    }

    async fn listing(&self, vin: &Vin) -> Result<Option<EnrichedListing>, StoreError> {
        Ok(self
            .listings
            .read()
            .rows
            .get(vin)
            .map(|stored| stored.record.clone()))
    }

    async fn listings(&self, filters: &ListingFilters) -> Result<Vec<EnrichedListing>, StoreError> {
        let table = self.listings.read();

        let mut matching: Vec<&StoredListing> = table
            .rows
            .values()
            .filter(|stored| {
                (filters.make.is_empty() || stored.record.build.make.eq_ignore_ascii_case(&filters.make))
                    && (filters.model.is_empty()
                        || stored.record.build.model.eq_ignore_ascii_case(&filters.model))
            })
            .collect();
        matching.sort_by(|a, b| b.revision.cmp(&a.revision));

        let limit = if filters.limit == 0 { usize::MAX } else { filters.limit };
        Ok(matching
            .into_iter()
            .skip(filters.offset)
            .take(limit)
            .map(|stored| stored.record.clone())
            .collect())
    }
}
