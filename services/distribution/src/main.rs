use std::sync::Arc;

use anyhow::Context;
use distribution::{BrokerBackend, Consumer, InMemoryBroker, PipelineConfig, Producer};
use market_data::{MarketCheckClient, ProviderConfig};
use persistence::{StoreConfig, Stores};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting distribution pipeline");

    let provider_config = ProviderConfig::from_env().context("provider configuration")?;
    let source = Arc::new(MarketCheckClient::new(&provider_config)?);

    let stores = Stores::open(&StoreConfig::from_env())
        .await
        .context("failed to open store")?;

    let config = PipelineConfig::from_env();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (producer_task, consumer_task) = match config.backend {
        BrokerBackend::Kafka => {
            let (publisher, subscriber) = kafka_clients(&config)?;
            let producer = Producer::new(source, publisher, config.batch_rows);
            let consumer = Consumer::new(subscriber, stores.prices, stores.listings)
                .with_retry_backoff(config.fetch_retry_backoff);
            (
                tokio::spawn(producer.run(config.producer_interval, shutdown_rx.clone())),
                tokio::spawn(consumer.run(shutdown_rx)),
            )
        }
        BrokerBackend::Memory => {
            tracing::warn!("Using in-memory broker, undelivered records are lost on exit");
            let broker = InMemoryBroker::new(config.topic.clone());
            let producer = Producer::new(source, broker.clone(), config.batch_rows);
            let consumer = Consumer::new(broker.subscribe(config.group.clone()), stores.prices, stores.listings)
                .with_retry_backoff(config.fetch_retry_backoff);
            (
                tokio::spawn(producer.run(config.producer_interval, shutdown_rx.clone())),
                tokio::spawn(consumer.run(shutdown_rx)),
            )
        }
    };
    tracing::info!(backend = ?config.backend, topic = %config.topic, group = %config.group, "Pipeline running");

    shutdown_signal().await;
    tracing::info!("Shutdown requested, stopping pipeline");
    let _ = shutdown_tx.send(true);

    let (producer_result, consumer_result) = tokio::join!(producer_task, consumer_task);
    producer_result.context("producer task panicked")?;
    consumer_result.context("consumer task panicked")?;

    tracing::info!("Distribution pipeline stopped");
    Ok(())
}

#[cfg(feature = "kafka")]
fn kafka_clients(
    config: &PipelineConfig,
) -> anyhow::Result<(Arc<distribution::KafkaPublisher>, distribution::KafkaSubscriber)> {
    let publisher = distribution::KafkaPublisher::new(&config.kafka_brokers, config.topic.clone())
        .context("failed to create Kafka producer")?;
    let subscriber = distribution::KafkaSubscriber::new(&config.kafka_brokers, config.topic.clone(), &config.group)
        .context("failed to create Kafka consumer")?;
    Ok((Arc::new(publisher), subscriber))
}

#[cfg(not(feature = "kafka"))]
fn kafka_clients(
    _config: &PipelineConfig,
) -> anyhow::Result<(Arc<InMemoryBroker>, distribution::InMemorySubscriber)> {
    anyhow::bail!("built without the `kafka` feature; set BROKER_BACKEND=memory")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
