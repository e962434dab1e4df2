//! Producer -> broker -> consumer over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use distribution::{Consumer, InMemoryBroker, Producer, Publisher, Stage};
use market_data::{ListingQuery, MarketDataSource, ProviderError};
use parking_lot::Mutex;
use persistence::{ListingRepository, MemoryStore, PriceStore};
use tokio::sync::watch;
use types::build::BuildSpec;
use types::ids::Vin;
use types::listing::Listing;
use types::pricing::{EnrichedListing, PricePoint, Valuation};

const VIN: &str = "1FAFP404X1F123456";
const GROUP: &str = "marketcheck-consumer";

/// Serves whatever listings are currently loaded.
#[derive(Default)]
struct Feed {
    listings: Mutex<Vec<Listing>>,
}

#[async_trait]
impl MarketDataSource for Feed {
    async fn active_listings(&self, _query: &ListingQuery) -> Result<Vec<Listing>, ProviderError> {
        Ok(self.listings.lock().clone())
    }

    async fn listing_by_id(&self, id: &str) -> Result<Listing, ProviderError> {
        Err(ProviderError::NotFound(id.to_string()))
    }

    async fn decode_build(&self, _vin: &Vin) -> Result<BuildSpec, ProviderError> {
        Ok(BuildSpec {
            year: 2001,
            make: "Ford".into(),
            model: "Mustang".into(),
            ..Default::default()
        })
    }
}

fn listing(price: i64) -> Listing {
    Listing {
        id: "listing-1".into(),
        vin: Vin::new(VIN),
        price,
        msrp: 25_000,
        ..Default::default()
    }
}

fn message(price: i64, at_secs: i64) -> Vec<u8> {
    let at = Utc.timestamp_opt(at_secs, 0).unwrap();
    let enriched = EnrichedListing::seeded(listing(price), BuildSpec::default(), at, Valuation::default());
    serde_json::to_vec(&enriched).unwrap()
}

#[tokio::test]
async fn test_producer_output_is_consumed_and_persisted() {
    let feed = Arc::new(Feed::default());
    feed.listings.lock().push(listing(20_000));
    let broker = InMemoryBroker::new("listings-raw");
    let store = Arc::new(MemoryStore::new());

    let producer = Producer::new(feed, broker.clone(), 100);
    producer.ingest_once().await.unwrap();

    let mut consumer = Consumer::new(broker.subscribe(GROUP), store.clone(), store.clone());
    let processed = consumer.poll_once().await.unwrap();

    assert_eq!(processed.reached, Stage::Persisted);
    assert_eq!(
        processed.valuation,
        Some(Valuation {
            is_good_value: false,
            score: 0.0,
        })
    );
    assert_eq!(broker.committed(GROUP), Some(1));

    let saved = store.listing(&Vin::new(VIN)).await.unwrap().unwrap();
    assert_eq!(saved.build.model, "Mustang");
    assert_eq!(saved.valuation.score, 0.0);
}

#[tokio::test]
async fn test_price_drop_is_recognized_as_good_value() {
    let broker = InMemoryBroker::new("listings-raw");
    let store = Arc::new(MemoryStore::new());
    let mut consumer = Consumer::new(broker.subscribe(GROUP), store.clone(), store.clone());

    let t0 = 1_700_000_000;
    broker.publish(VIN, message(20_000, t0)).await.unwrap();
    let first = consumer.poll_once().await.unwrap();
    assert_eq!(
        first.valuation,
        Some(Valuation {
            is_good_value: false,
            score: 0.0,
        })
    );

    let t1 = t0 + 86_400;
    broker.publish(VIN, message(18_000, t1)).await.unwrap();
    let second = consumer.poll_once().await.unwrap();
    let valuation = second.valuation.unwrap();
    assert!(valuation.is_good_value);
    assert!((valuation.score - 1_000.0 / 19_000.0).abs() < 1e-9);

    let vin = Vin::new(VIN);
    let history = store.history(&vin).await.unwrap();
    assert_eq!(
        history,
        vec![
            PricePoint::new(20_000, Utc.timestamp_opt(t0, 0).unwrap()),
            PricePoint::new(18_000, Utc.timestamp_opt(t1, 0).unwrap()),
        ]
    );

    let saved = store.listing(&vin).await.unwrap().unwrap();
    assert_eq!(saved.listing.price, 18_000);
    assert!(saved.valuation.is_good_value);
    assert_eq!(broker.committed(GROUP), Some(2));
}

#[tokio::test]
async fn test_redelivered_price_point_is_not_double_counted() {
    let broker = InMemoryBroker::new("listings-raw");
    let store = Arc::new(MemoryStore::new());

    broker.publish(VIN, message(20_000, 1_000)).await.unwrap();
    broker.publish(VIN, message(20_000, 1_000)).await.unwrap();

    let mut consumer = Consumer::new(broker.subscribe(GROUP), store.clone(), store.clone());
    consumer.poll_once().await.unwrap();
    consumer.poll_once().await.unwrap();

    assert_eq!(store.history(&Vin::new(VIN)).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loops_run_together_and_stop_on_shutdown() {
    let feed = Arc::new(Feed::default());
    feed.listings.lock().push(listing(20_000));
    let broker = InMemoryBroker::new("listings-raw");
    let store = Arc::new(MemoryStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let producer = Producer::new(feed.clone(), broker.clone(), 100);
    let consumer = Consumer::new(broker.subscribe(GROUP), store.clone(), store.clone());
    let producer_task = tokio::spawn(producer.run(Duration::from_secs(60), shutdown_rx.clone()));
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(broker.committed(GROUP), Some(1));
    assert!(store.listing(&Vin::new(VIN)).await.unwrap().is_some());

    shutdown_tx.send(true).unwrap();
    producer_task.await.unwrap();
    consumer_task.await.unwrap();
}
