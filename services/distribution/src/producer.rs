//! Producer loop
//!
//! Polls the provider on a fixed interval, decodes each listing's build, and
//! publishes the result keyed by VIN. Only an authoritative decode is
//! accepted here: a listing whose decode fails is skipped, even if it carries
//! an embedded build.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use market_data::{ListingQuery, MarketDataSource, ProviderError};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use types::listing::Listing;
use types::pricing::{EnrichedListing, Valuation};

use crate::broker::Publisher;

/// Outcome counts for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub published: usize,
    /// Listings dropped for a missing VIN or a failed decode
    pub skipped: usize,
    /// Listings whose serialization or publish failed
    pub failed: usize,
}

pub struct Producer {
    source: Arc<dyn MarketDataSource>,
    publisher: Arc<dyn Publisher>,
    query: ListingQuery,
}

impl Producer {
    pub fn new(source: Arc<dyn MarketDataSource>, publisher: Arc<dyn Publisher>, batch_rows: u32) -> Self {
        Self {
            source,
            publisher,
            query: ListingQuery::rows(batch_rows),
        }
    }

    /// Run one poll. Fails only when the listing page itself can't be fetched.
    pub async fn ingest_once(&self) -> Result<IngestReport, ProviderError> {
        let listings = self.source.active_listings(&self.query).await?;
        let mut report = IngestReport {
            fetched: listings.len(),
            ..Default::default()
        };

        let observed_at = Utc::now();
        for listing in listings {
            match self.decode(listing, observed_at).await {
                Some(enriched) => {
                    if self.publish(&enriched).await {
                        report.published += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                None => report.skipped += 1,
            }
        }

        info!(
            fetched = report.fetched,
            published = report.published,
            skipped = report.skipped,
            failed = report.failed,
            "Producer poll complete"
        );
        Ok(report)
    }

    async fn decode(&self, listing: Listing, observed_at: DateTime<Utc>) -> Option<EnrichedListing> {
        if listing.vin.is_empty() {
            warn!(listing_id = %listing.id, "Skipping listing without VIN");
            return None;
        }

        match self.source.decode_build(&listing.vin).await {
            Ok(build) => Some(EnrichedListing::seeded(
                listing,
                build,
                observed_at,
                Valuation::default(),
            )),
            Err(e) => {
                warn!(vin = %listing.vin, error = %e, "Build decode failed, skipping listing");
                None
            }
        }
    }

    async fn publish(&self, enriched: &EnrichedListing) -> bool {
        let payload = match serde_json::to_vec(enriched) {
            Ok(payload) => payload,
            Err(e) => {
                error!(vin = %enriched.vin(), error = %e, "Failed to serialize listing");
                return false;
            }
        };

        match self.publisher.publish(enriched.vin().as_str(), payload).await {
            Ok(()) => {
                debug!(vin = %enriched.vin(), "Published listing");
                true
            }
            Err(e) => {
                error!(vin = %enriched.vin(), error = %e, "Failed to publish listing");
                false
            }
        }
    }

    /// Poll every `every` until `shutdown` flips. The first poll runs
    /// immediately; a failed poll is logged and the next tick proceeds.
    pub async fn run(self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "Producer started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                _ = ticker.tick() => {
                    if let Err(e) = self.ingest_once().await {
                        error!(error = %e, "Failed to fetch active listings");
                    }
                }
            }
        }

        info!("Producer stopped");
    }
}
