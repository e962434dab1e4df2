//! Consumer loop
//!
//! Each message moves through
//! `Fetched -> Deserialized -> PriceRecorded -> ValuationRecomputed -> Persisted -> Committed`.
//!
//! A failure before the price is recorded leaves the message uncommitted.
//! Commits are cumulative, so `run` retries a message whose price could not
//! be stored until it goes through instead of moving on and committing past
//! it. Messages that can never be processed (undecodable payload, no VIN) are
//! skipped. Once the price point is durable the message is always committed,
//! even if the later steps fail: the price store upserts on (VIN, timestamp),
//! so reprocessing could not add anything and would only loop.

use std::sync::Arc;
use std::time::Duration;

use persistence::{ListingRepository, PriceStore, StoreError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use types::errors::TypesError;
use types::ids::Vin;
use types::pricing::{EnrichedListing, PricePoint, Valuation};
use types::valuation::compute_valuation;

use crate::broker::{BrokerError, Delivery, Subscriber};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to decode message at offset {offset}: {source}")]
    Decode {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("message at offset {offset} is invalid: {source}")]
    InvalidMessage {
        offset: u64,
        #[source]
        source: TypesError,
    },

    #[error("failed to record price for {vin}: {source}")]
    RecordPrice {
        vin: Vin,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Last stage a message reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Fetched,
    Deserialized,
    PriceRecorded,
    ValuationRecomputed,
    Persisted,
    Committed,
}

/// Result of a committed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub vin: Vin,
    pub offset: u64,
    /// Furthest stage reached before the commit
    pub reached: Stage,
    /// Recomputed valuation, absent when the history could not be read
    pub valuation: Option<Valuation>,
}

pub struct Consumer<S> {
    subscriber: S,
    prices: Arc<dyn PriceStore>,
    listings: Arc<dyn ListingRepository>,
    retry_backoff: Duration,
}

impl<S: Subscriber> Consumer<S> {
    pub fn new(subscriber: S, prices: Arc<dyn PriceStore>, listings: Arc<dyn ListingRepository>) -> Self {
        Self {
            subscriber,
            prices,
            listings,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Pause before retrying a failed fetch or an unrecorded message.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Fetch one message and process it.
    pub async fn poll_once(&mut self) -> Result<Processed, ConsumerError> {
        let delivery = self.subscriber.fetch().await?;
        self.process(&delivery).await
    }

    /// Take a fetched message to `Committed`, or fail before `PriceRecorded`.
    pub async fn process(&mut self, delivery: &Delivery) -> Result<Processed, ConsumerError> {
        let mut enriched: EnrichedListing =
            serde_json::from_slice(&delivery.payload).map_err(|source| ConsumerError::Decode {
                offset: delivery.offset,
                source,
            })?;

        let vin = message_vin(&enriched, &delivery.key).map_err(|source| ConsumerError::InvalidMessage {
            offset: delivery.offset,
            source,
        })?;

        let point = enriched
            .price_history
            .first()
            .copied()
            .unwrap_or_else(|| PricePoint::new(enriched.listing.price, delivery.received_at));

        self.prices
            .add_price(&vin, point)
            .await
            .map_err(|source| ConsumerError::RecordPrice {
                vin: vin.clone(),
                source,
            })?;

        let mut processed = Processed {
            vin: vin.clone(),
            offset: delivery.offset,
            reached: Stage::PriceRecorded,
            valuation: None,
        };

        match self.prices.history(&vin).await {
            Ok(history) => {
                let valuation = compute_valuation(&history, enriched.listing.price);
                enriched.valuation = valuation;
                enriched.price_history = history;
                processed.valuation = Some(valuation);
                processed.reached = Stage::ValuationRecomputed;

                match self.listings.save_listing(&enriched).await {
                    Ok(()) => processed.reached = Stage::Persisted,
                    Err(e) => warn!(vin = %vin, error = %e, "Failed to save listing, committing anyway"),
                }
            }
            Err(e) => warn!(vin = %vin, error = %e, "Failed to read price history, committing anyway"),
        }

        self.subscriber.commit(delivery).await?;
        debug!(
            vin = %vin,
            offset = delivery.offset,
            reached = ?processed.reached,
            score = processed.valuation.map(|v| v.score),
            "Message committed"
        );
        Ok(processed)
    }

    /// Consume until `shutdown` flips or the broker closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Consumer started");

        loop {
            let fetched = tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                fetched = self.subscriber.fetch() => fetched,
            };

            match fetched {
                Ok(delivery) => {
                    if !self.settle(&delivery, &mut shutdown).await {
                        break;
                    }
                }
                Err(BrokerError::Closed(topic)) => {
                    info!(topic = %topic, "Broker closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Fetch failed, retrying");
                    tokio::select! {
                        biased;

                        _ = shutdown.changed() => break,

                        _ = tokio::time::sleep(self.retry_backoff) => {}
                    }
                }
            }
        }

        info!("Consumer stopped");
    }

    /// Process `delivery` until it is committed or skipped. Returns false when
    /// the loop should stop instead.
    async fn settle(&mut self, delivery: &Delivery, shutdown: &mut watch::Receiver<bool>) -> bool {
        loop {
            let err = match self.process(delivery).await {
                Ok(_) => return true,
                Err(e) => e,
            };

            match &err {
                ConsumerError::Decode { .. } | ConsumerError::InvalidMessage { .. } => {
                    warn!(offset = delivery.offset, error = %err, "Skipping unprocessable message");
                    return true;
                }
                ConsumerError::Broker(BrokerError::Closed(topic)) => {
                    info!(topic = %topic, "Broker closed");
                    return false;
                }
                ConsumerError::RecordPrice { .. } | ConsumerError::Broker(_) => {
                    warn!(
                        offset = delivery.offset,
                        error = %err,
                        "Message not committed, retrying"
                    );
                }
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => return false,

                _ = tokio::time::sleep(self.retry_backoff) => {}
            }
        }
    }
}

fn message_vin(enriched: &EnrichedListing, key: &str) -> Result<Vin, TypesError> {
    if enriched.vin().is_empty() {
        Vin::parse(key)
    } else {
        Ok(enriched.vin().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{InMemoryBroker, Publisher};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use persistence::{ListingFilters, MemoryStore};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use types::build::BuildSpec;
    use types::listing::Listing;

    /// Wraps a `MemoryStore`, failing selected operations on demand.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        /// Number of upcoming `add_price` calls to refuse
        refused_adds: AtomicUsize,
        fail_history: AtomicBool,
        fail_save: AtomicBool,
    }

    #[async_trait]
    impl PriceStore for FaultyStore {
        async fn add_price(&self, vin: &Vin, point: PricePoint) -> Result<(), StoreError> {
            let refuse = self
                .refused_adds
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refuse {
                return Err(StoreError::InvalidRecord("add refused".into()));
            }
            self.inner.add_price(vin, point).await
        }

        async fn history(&self, vin: &Vin) -> Result<Vec<PricePoint>, StoreError> {
            if self.fail_history.load(Ordering::SeqCst) {
                return Err(StoreError::InvalidRecord("history refused".into()));
            }
            self.inner.history(vin).await
        }
    }

    #[async_trait]
    impl ListingRepository for FaultyStore {
        async fn save_listing(&self, listing: &EnrichedListing) -> Result<(), StoreError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(StoreError::InvalidRecord("save refused".into()));
            }
            self.inner.save_listing(listing).await
        }

        async fn listing(&self, vin: &Vin) -> Result<Option<EnrichedListing>, StoreError> {
            self.inner.listing(vin).await
        }

        async fn listings(&self, filters: &ListingFilters) -> Result<Vec<EnrichedListing>, StoreError> {
            self.inner.listings(filters).await
        }
    }

    const GROUP: &str = "test-group";

    fn message(vin: &str, price: i64, at_secs: i64) -> Vec<u8> {
        let listing = Listing {
            vin: Vin::new(vin),
            price,
            ..Default::default()
        };
        let at = Utc.timestamp_opt(at_secs, 0).unwrap();
        let enriched = EnrichedListing::seeded(listing, BuildSpec::default(), at, Valuation::default());
        serde_json::to_vec(&enriched).unwrap()
    }

    fn consumer(broker: &Arc<InMemoryBroker>, store: &Arc<FaultyStore>) -> Consumer<crate::broker::InMemorySubscriber> {
        Consumer::new(broker.subscribe(GROUP), store.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_valid_message_reaches_persisted_and_commits() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();

        let processed = consumer(&broker, &store).poll_once().await.unwrap();

        assert_eq!(processed.reached, Stage::Persisted);
        assert_eq!(processed.valuation, Some(Valuation::default()));
        assert_eq!(broker.committed(GROUP), Some(1));

        let saved = store.inner.listing(&Vin::new("VIN1")).await.unwrap().unwrap();
        assert_eq!(saved.listing.price, 20_000);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_not_committed() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        broker.publish("VIN1", b"{not json".to_vec()).await.unwrap();
        broker.publish("VIN2", message("VIN2", 15_000, 1_000)).await.unwrap();

        let mut consumer = consumer(&broker, &store);
        assert!(matches!(
            consumer.poll_once().await,
            Err(ConsumerError::Decode { offset: 0, .. })
        ));
        assert_eq!(broker.committed(GROUP), None);

        // The next message is still processed.
        let processed = consumer.poll_once().await.unwrap();
        assert_eq!(processed.vin.as_str(), "VIN2");
    }

    #[tokio::test]
    async fn test_price_record_failure_is_not_committed() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        store.refused_adds.store(1, Ordering::SeqCst);
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();

        let result = consumer(&broker, &store).poll_once().await;
        assert!(matches!(result, Err(ConsumerError::RecordPrice { .. })));
        assert_eq!(broker.committed(GROUP), None);

        // Redelivered to the next member of the group.
        let processed = consumer(&broker, &store).poll_once().await.unwrap();
        assert_eq!(processed.offset, 0);
    }

    #[tokio::test]
    async fn test_history_failure_still_commits_without_persisting() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        store.fail_history.store(true, Ordering::SeqCst);
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();

        let processed = consumer(&broker, &store).poll_once().await.unwrap();

        assert_eq!(processed.reached, Stage::PriceRecorded);
        assert_eq!(processed.valuation, None);
        assert_eq!(broker.committed(GROUP), Some(1));
        assert_eq!(store.inner.listing_count(), 0);
    }

    #[tokio::test]
    async fn test_save_failure_still_commits() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        store.fail_save.store(true, Ordering::SeqCst);
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();

        let processed = consumer(&broker, &store).poll_once().await.unwrap();

        assert_eq!(processed.reached, Stage::ValuationRecomputed);
        assert_eq!(broker.committed(GROUP), Some(1));
        assert_eq!(store.inner.history(&Vin::new("VIN1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_history_uses_receive_time() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        let bare = EnrichedListing {
            listing: Listing {
                vin: Vin::new("VIN1"),
                price: 12_345,
                ..Default::default()
            },
            ..Default::default()
        };
        broker.publish("VIN1", serde_json::to_vec(&bare).unwrap()).await.unwrap();

        let mut consumer = consumer(&broker, &store);
        let delivery = consumer.subscriber.fetch().await.unwrap();
        consumer.process(&delivery).await.unwrap();

        let history = store.inner.history(&Vin::new("VIN1")).await.unwrap();
        assert_eq!(history, vec![PricePoint::new(12_345, delivery.received_at)]);
    }

    #[tokio::test]
    async fn test_vin_falls_back_to_message_key() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        broker.publish("KEYVIN", message("", 9_000, 1_000)).await.unwrap();
        broker.publish("", message("", 9_000, 1_000)).await.unwrap();

        let mut consumer = consumer(&broker, &store);
        assert_eq!(consumer.poll_once().await.unwrap().vin.as_str(), "KEYVIN");
        assert!(matches!(
            consumer.poll_once().await,
            Err(ConsumerError::InvalidMessage { offset: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(consumer(&broker, &store).run(shutdown_rx));
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();

        for _ in 0..100 {
            if broker.committed(GROUP) == Some(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(broker.committed(GROUP), Some(1));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    async fn wait_for_commit(broker: &InMemoryBroker, offset: u64) {
        for _ in 0..100 {
            if broker.committed(GROUP) == Some(offset) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_unrecorded_message_before_moving_on() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        store.refused_adds.store(1, Ordering::SeqCst);
        for (price, at) in [(20_000, 1_000), (19_000, 2_000), (18_000, 3_000)] {
            broker.publish("VIN1", message("VIN1", price, at)).await.unwrap();
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = consumer(&broker, &store).with_retry_backoff(Duration::from_millis(50));
        let handle = tokio::spawn(consumer.run(shutdown_rx));
        wait_for_commit(&broker, 3).await;

        let history = store.inner.history(&Vin::new("VIN1")).await.unwrap();
        let prices: Vec<i64> = history.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![20_000, 19_000, 18_000]);
        assert_eq!(broker.committed(GROUP), Some(3));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_skips_undecodable_message() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        broker.publish("VIN1", b"{not json".to_vec()).await.unwrap();
        broker.publish("VIN2", message("VIN2", 15_000, 1_000)).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(consumer(&broker, &store).run(shutdown_rx));
        wait_for_commit(&broker, 2).await;

        assert_eq!(broker.committed(GROUP), Some(2));
        assert_eq!(store.inner.history(&Vin::new("VIN2")).await.unwrap().len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_retry() {
        let broker = InMemoryBroker::new("listings-raw");
        let store = Arc::new(FaultyStore::default());
        store.refused_adds.store(usize::MAX, Ordering::SeqCst);
        broker.publish("VIN1", message("VIN1", 20_000, 1_000)).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(consumer(&broker, &store).run(shutdown_rx));
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(broker.committed(GROUP), None);
    }
}
