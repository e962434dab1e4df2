//! PostgreSQL store
//!
//! Schema:
//! ```text
//! price_history(id, vin, price, date, created_at)   UNIQUE(vin, date)
//! listings(id, vin UNIQUE, listing_data JSONB, build_data JSONB,
//!          valuation_data JSONB, created_at, updated_at)
//! ```
//! The schema is bootstrapped with `IF NOT EXISTS` statements on connect.
//! Upserts use `ON CONFLICT`, so every write is idempotent on its key.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::warn;
use types::build::BuildSpec;
use types::ids::Vin;
use types::listing::Listing;
use types::pricing::{EnrichedListing, PricePoint, Valuation};

use crate::config::StoreConfig;
use crate::store::{ListingFilters, ListingRepository, PriceStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS price_history (
    id SERIAL PRIMARY KEY,
    vin VARCHAR(17) NOT NULL,
    price BIGINT NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(vin, date)
);

CREATE INDEX IF NOT EXISTS idx_price_history_vin ON price_history(vin);
CREATE INDEX IF NOT EXISTS idx_price_history_date ON price_history(date);

CREATE TABLE IF NOT EXISTS listings (
    id SERIAL PRIMARY KEY,
    vin VARCHAR(17) UNIQUE NOT NULL,
    listing_data JSONB NOT NULL,
    build_data JSONB NOT NULL,
    valuation_data JSONB,
    created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_listings_listing_data ON listings USING GIN(listing_data);
CREATE INDEX IF NOT EXISTS idx_listings_build_data ON listings USING GIN(build_data);
"#;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Create the pool, check connectivity and bootstrap the schema.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.database_url.clone());
        cfg.connect_timeout = Some(config.connect_timeout);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(config.max_pool_size));

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        Ok(())
    }
}

fn decode_listing(row: &Row) -> Result<EnrichedListing, StoreError> {
    let listing_json: JsonValue = row.try_get("listing_data")?;
    let build_json: JsonValue = row.try_get("build_data")?;
    let valuation_json: Option<JsonValue> = row.try_get("valuation_data")?;

    let listing: Listing = serde_json::from_value(listing_json)?;
    let build: BuildSpec = serde_json::from_value(build_json)?;
    let valuation: Valuation = match valuation_json {
        Some(json) => serde_json::from_value(json).unwrap_or_default(),
        None => Valuation::default(),
    };

    Ok(EnrichedListing {
        listing,
        build,
        price_history: Vec::new(),
        valuation,
    })
}

#[async_trait]
impl PriceStore for PostgresStore {
    async fn add_price(&self, vin: &Vin, point: PricePoint) -> Result<(), StoreError> {
        if vin.is_empty() {
            return Err(StoreError::InvalidRecord("VIN must not be empty".into()));
        }
        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO price_history (vin, price, date)
             VALUES ($1, $2, $3)
             ON CONFLICT (vin, date) DO UPDATE SET price = EXCLUDED.price",
            &[&vin.as_str(), &point.price, &point.date],
        )
        .await?;
        Ok(())
    }

    async fn history(&self, vin: &Vin) -> Result<Vec<PricePoint>, StoreError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .query(
                "SELECT price, date FROM price_history WHERE vin = $1 ORDER BY date ASC",
                &[&vin.as_str()],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<PricePoint, StoreError> {
                Ok(PricePoint::new(row.try_get("price")?, row.try_get("date")?))
            })
            .collect()
    }
}

#[async_trait]
impl ListingRepository for PostgresStore {
    async fn save_listing(&self, listing: &EnrichedListing) -> Result<(), StoreError> {
        if listing.vin().is_empty() {
            return Err(StoreError::InvalidRecord("VIN must not be empty".into()));
        }
        let listing_json = serde_json::to_value(&listing.listing)?;
        let build_json = serde_json::to_value(&listing.build)?;
        let valuation_json = serde_json::to_value(listing.valuation)?;

        let conn = self.pool.get().await?;
        conn.execute(
            "INSERT INTO listings (vin, listing_data, build_data, valuation_data)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (vin) DO UPDATE SET
                 listing_data = EXCLUDED.listing_data,
                 build_data = EXCLUDED.build_data,
                 valuation_data = EXCLUDED.valuation_data,
                 updated_at = CURRENT_TIMESTAMP",
            &[&listing.vin().as_str(), &listing_json, &build_json, &valuation_json],
        )
        .await?;
        Ok(())
    }

    async fn listing(&self, vin: &Vin) -> Result<Option<EnrichedListing>, StoreError> {
        let conn = self.pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT listing_data, build_data, valuation_data FROM listings WHERE vin = $1",
                &[&vin.as_str()],
            )
            .await?;

        row.as_ref().map(decode_listing).transpose()
    }

    async fn listings(&self, filters: &ListingFilters) -> Result<Vec<EnrichedListing>, StoreError> {
        let limit = filters.limit as i64;
        let offset = filters.offset as i64;

        // Placeholders are numbered in this push order; see `listings_sql`.
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if !filters.make.is_empty() {
            params.push(&filters.make);
        }
        if !filters.model.is_empty() {
            params.push(&filters.model);
        }
        if filters.limit > 0 {
            params.push(&limit);
        }
        if filters.offset > 0 {
            params.push(&offset);
        }
        let sql = listings_sql(filters);

        let conn = self.pool.get().await?;
        let rows = conn.query(sql.as_str(), &params).await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_listing(row) {
                Ok(listing) => listings.push(listing),
                Err(e) => warn!(error = %e, "Skipping undecodable listing row"),
            }
        }
        Ok(listings)
    }
}

/// Listing query for `filters`. Make and model match whole values ignoring
/// case, so `%` and `_` in a filter are literal characters.
fn listings_sql(filters: &ListingFilters) -> String {
    let mut sql = String::from("SELECT listing_data, build_data, valuation_data FROM listings WHERE 1=1");
    let mut next = 0;
    let mut placeholder = || {
        next += 1;
        next
    };

    if !filters.make.is_empty() {
        sql.push_str(&format!(" AND lower(build_data->>'make') = lower(${})", placeholder()));
    }
    if !filters.model.is_empty() {
        sql.push_str(&format!(" AND lower(build_data->>'model') = lower(${})", placeholder()));
    }
    sql.push_str(" ORDER BY updated_at DESC");
    if filters.limit > 0 {
        sql.push_str(&format!(" LIMIT ${}", placeholder()));
    }
    if filters.offset > 0 {
        sql.push_str(&format!(" OFFSET ${}", placeholder()));
    }
    sql
}
