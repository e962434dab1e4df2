//! Kafka-backed `Publisher` and `Subscriber`
//!
//! Records are keyed by VIN so one vehicle's updates stay on one partition and
//! keep their order. The subscriber joins a consumer group with auto-commit
//! off; offsets only move when the consumer commits a processed delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use crate::broker::{BrokerError, Delivery, Publisher, Subscriber};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

impl From<KafkaError> for BrokerError {
    fn from(err: KafkaError) -> Self {
        BrokerError::Transport(err.to_string())
    }
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", DEFAULT_SEND_TIMEOUT.as_millis().to_string())
            .create()?;
        let topic = topic.into();
        info!(brokers, topic = %topic, "Kafka producer created");
        Ok(Self {
            producer,
            topic,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
            .map_err(|(err, _)| BrokerError::from(err))?;
        debug!(key, partition, offset, "Record published");
        Ok(())
    }
}

pub struct KafkaSubscriber {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSubscriber {
    /// Join `group` on `topic`. A group with no committed offset starts from
    /// the earliest retained record.
    pub fn new(brokers: &str, topic: impl Into<String>, group: &str) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        let topic = topic.into();
        consumer.subscribe(&[topic.as_str()])?;
        info!(brokers, topic = %topic, group, "Kafka consumer subscribed");
        Ok(Self { consumer, topic })
    }
}

#[async_trait]
impl Subscriber for KafkaSubscriber {
    async fn fetch(&mut self) -> Result<Delivery, BrokerError> {
        let message = self.consumer.recv().await?;
        let offset = u64::try_from(message.offset())
            .map_err(|_| BrokerError::Transport(format!("invalid offset {}", message.offset())))?;
        Ok(Delivery {
            key: message
                .key()
                .map(|key| String::from_utf8_lossy(key).into_owned())
                .unwrap_or_default(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            partition: message.partition(),
            offset,
            received_at: Utc::now(),
        })
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        let next = i64::try_from(delivery.offset + 1).map_err(|_| BrokerError::UnknownOffset {
            topic: self.topic.clone(),
            offset: delivery.offset,
        })?;
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&self.topic, delivery.partition, Offset::Offset(next))?;
        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }
}
