//! Pipeline configuration

use std::time::Duration;

pub const DEFAULT_TOPIC: &str = "listings-raw";
pub const DEFAULT_GROUP: &str = "marketcheck-consumer";
pub const DEFAULT_PRODUCER_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_BATCH_ROWS: u32 = 100;
pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";

/// Where the topic lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    Kafka,
    /// In-process log; lost on exit
    Memory,
}

impl BrokerBackend {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => BrokerBackend::Memory,
            _ => BrokerBackend::Kafka,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub backend: BrokerBackend,
    /// Comma-separated bootstrap servers
    pub kafka_brokers: String,
    pub topic: String,
    pub group: String,
    /// Time between producer polls
    pub producer_interval: Duration,
    /// Listings requested per producer poll
    pub batch_rows: u32,
    /// Pause before retrying a failed broker fetch
    pub fetch_retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Kafka,
            kafka_brokers: DEFAULT_KAFKA_BROKERS.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            group: DEFAULT_GROUP.to_string(),
            producer_interval: Duration::from_secs(DEFAULT_PRODUCER_INTERVAL_SECS),
            batch_rows: DEFAULT_BATCH_ROWS,
            fetch_retry_backoff: Duration::from_secs(1),
        }
    }
}

impl PipelineConfig {
    /// # Environment Variables
    /// - `BROKER_BACKEND`: `kafka` (default) or `memory`
    /// - `KAFKA_BROKERS`: bootstrap servers (default: localhost:9092)
    /// - `BROKER_TOPIC`: topic name (default: listings-raw)
    /// - `BROKER_GROUP`: consumer group (default: marketcheck-consumer)
    /// - `PRODUCER_INTERVAL_SECS`: producer poll interval (default: 60)
    /// - `PRODUCER_BATCH_ROWS`: listings per poll (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: std::env::var("BROKER_BACKEND")
                .map(|value| BrokerBackend::parse(&value))
                .unwrap_or(defaults.backend),
            kafka_brokers: std::env::var("KAFKA_BROKERS")
                .ok()
                .filter(|brokers| !brokers.trim().is_empty())
                .unwrap_or(defaults.kafka_brokers),
            topic: std::env::var("BROKER_TOPIC").unwrap_or(defaults.topic),
            group: std::env::var("BROKER_GROUP").unwrap_or(defaults.group),
            producer_interval: std::env::var("PRODUCER_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.producer_interval),
            batch_rows: std::env::var("PRODUCER_BATCH_ROWS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|rows| *rows > 0)
                .unwrap_or(defaults.batch_rows),
            fetch_retry_backoff: defaults.fetch_retry_backoff,
        }
    }
}
