//! Parallel listing enrichment
//!
//! One task per listing resolves its build spec (cache, then provider decode,
//! then the listing's embedded spec). All tasks are joined before anything is
//! assembled, and results land in a pre-sized slot array indexed by input
//! position, so completion order never affects output order.
//!
//! Failure isolation:
//! - the listing page fetch failing fails the whole search
//! - one listing's build failing drops only that listing
//! - persistence failures are logged and never change the result

use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_data::{MarketDataSource, ProviderError};
use persistence::ListingRepository;
use thiserror::Error;
use tracing::{debug, info, warn};
use types::build::BuildSpec;
use types::ids::Vin;
use types::listing::Listing;
use types::pricing::EnrichedListing;
use types::valuation::msrp_valuation;

use crate::cache::BuildCache;
use crate::search::SearchCriteria;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("failed to fetch listings: {0}")]
    Upstream(#[from] ProviderError),
}

/// Enriches listing batches against a shared build cache.
#[derive(Clone)]
pub struct Enricher {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<BuildCache>,
    listings: Option<Arc<dyn ListingRepository>>,
}

impl Enricher {
    pub fn new(source: Arc<dyn MarketDataSource>, cache: Arc<BuildCache>) -> Self {
        Self {
            source,
            cache,
            listings: None,
        }
    }

    /// Persist every enriched listing to `repository` after enrichment.
    pub fn with_repository(mut self, repository: Arc<dyn ListingRepository>) -> Self {
        self.listings = Some(repository);
        self
    }

    pub fn cache(&self) -> &Arc<BuildCache> {
        &self.cache
    }

    /// Run a search: fetch the listing page, select matches, enrich, persist.
    ///
    /// Only the page fetch can fail the call.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<EnrichedListing>, EnrichmentError> {
        let listings = self.source.active_listings(&criteria.provider_query()).await?;
        let fetched = listings.len();

        let selected = criteria.select(listings);
        debug!(fetched, selected = selected.len(), "Selected listings for enrichment");

        let enriched = self.enrich(selected).await;
        self.persist(&enriched).await;
        Ok(enriched)
    }

    /// Enrich listings in input order, dropping those without a build spec.
    ///
    /// Each result carries a one-point price history (current price, now) and
    /// an MSRP-based valuation, since no history exists yet.
    pub async fn enrich(&self, listings: Vec<Listing>) -> Vec<EnrichedListing> {
        self.enrich_at(listings, Utc::now()).await
    }

    async fn enrich_at(&self, listings: Vec<Listing>, observed_at: DateTime<Utc>) -> Vec<EnrichedListing> {
        let total = listings.len();
        let builds = self.resolve_builds(&listings).await;

        let enriched: Vec<EnrichedListing> = listings
            .into_iter()
            .zip(builds)
            .filter_map(|(listing, build)| {
                let build = build?;
                let valuation = msrp_valuation(listing.price, listing.msrp);
                Some(EnrichedListing::seeded(listing, build, observed_at, valuation))
            })
            .collect();

        info!(
            requested = total,
            enriched = enriched.len(),
            dropped = total - enriched.len(),
            "Enrichment batch complete"
        );
        enriched
    }

    /// Resolve a build spec for every listing in parallel.
    ///
    /// Returns one slot per input listing, in input order; `None` marks a
    /// listing whose build could not be obtained. Returns only after every
    /// task has finished.
    pub async fn resolve_builds(&self, listings: &[Listing]) -> Vec<Option<BuildSpec>> {
        let handles: Vec<_> = listings
            .iter()
            .map(|listing| {
                let source = self.source.clone();
                let cache = self.cache.clone();
                let vin = listing.vin.clone();
                let fallback = listing.embedded_build().cloned();
                tokio::spawn(resolve_build(source, cache, vin, fallback))
            })
            .collect();

        // Barrier: every task is awaited before any slot is read. Dropping a
        // JoinHandle detaches rather than aborts, so tasks are never cut short.
        let mut slots: Vec<Option<BuildSpec>> = vec![None; listings.len()];
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(build) => slots[idx] = build,
                Err(e) => warn!(
                    vin = %listings[idx].vin,
                    error = %e,
                    "Build resolution task failed"
                ),
            }
        }
        slots
    }

    /// Store each listing independently. Returns how many were saved.
    pub async fn persist(&self, enriched: &[EnrichedListing]) -> usize {
        let Some(repository) = &self.listings else {
            return 0;
        };

        let mut saved = 0;
        for listing in enriched {
            match repository.save_listing(listing).await {
                Ok(()) => saved += 1,
                Err(e) => warn!(vin = %listing.vin(), error = %e, "Failed to save listing"),
            }
        }
        saved
    }
}

async fn resolve_build(
    source: Arc<dyn MarketDataSource>,
    cache: Arc<BuildCache>,
    vin: Vin,
    fallback: Option<BuildSpec>,
) -> Option<BuildSpec> {
    if let Some(build) = cache.get(&vin) {
        debug!(vin = %vin, "Build cache hit");
        return Some(build);
    }

    match source.decode_build(&vin).await {
        Ok(build) => {
            cache.set(vin, build.clone());
            Some(build)
        }
        Err(e) => match fallback {
            // Listing-sourced, not an authoritative decode: never cached.
            Some(build) => {
                warn!(vin = %vin, error = %e, "Build decode failed, using listing build");
                Some(build)
            }
            None => {
                warn!(vin = %vin, error = %e, "Build decode failed, dropping listing");
                None
            }
        },
    }
}
