//! Broker abstraction for the distribution topic
//!
//! `Publisher` and `Subscriber` are the only surface the pipeline sees.
//! Delivery is at-least-once: a subscriber reads records in offset order and
//! commits them explicitly, and a new subscriber for the same group starts
//! at the group's committed offset. Commits are cumulative, so committing a
//! record also covers every earlier one on its partition. A record that must
//! not be lost has to be retried before anything after it is committed.
//!
//! `InMemoryBroker` implements both sides for a single process. The Kafka
//! backend lives in [`crate::kafka`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("broker for topic {0} is closed")]
    Closed(String),

    #[error("offset {offset} was never delivered on topic {topic}")]
    UnknownOffset { topic: String, offset: u64 },

    #[error("broker transport error: {0}")]
    Transport(String),
}

/// A record handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub key: String,
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: u64,
    /// When this subscriber received the record
    pub received_at: DateTime<Utc>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;
}

#[async_trait]
pub trait Subscriber: Send {
    /// Wait for the next record.
    async fn fetch(&mut self) -> Result<Delivery, BrokerError>;

    /// Mark `delivery` and everything before it on its partition as
    /// processed for this group.
    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BrokerError>;
}

struct Record {
    key: String,
    payload: Vec<u8>,
}

#[derive(Default)]
struct TopicLog {
    /// Retained records; the front one has offset `base`
    records: VecDeque<Record>,
    base: u64,
    /// Groups that ever subscribed. Records are kept until all of them commit.
    groups: HashSet<String>,
    /// Next offset to read, per consumer group
    committed: HashMap<String, u64>,
    closed: bool,
}

impl TopicLog {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    /// Drop records every known group has committed past.
    fn compact(&mut self) -> usize {
        let Some(floor) = self
            .groups
            .iter()
            .map(|group| self.committed.get(group).copied().unwrap_or(self.base))
            .min()
        else {
            return 0;
        };
        let mut dropped = 0;
        while self.base < floor && self.records.pop_front().is_some() {
            self.base += 1;
            dropped += 1;
        }
        dropped
    }
}

/// Single-topic log with consumer-group offsets.
///
/// Only one partition exists, so every delivery carries partition 0.
pub struct InMemoryBroker {
    topic: String,
    log: Mutex<TopicLog>,
    appended: Notify,
}

impl InMemoryBroker {
    pub fn new(topic: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            topic: topic.into(),
            log: Mutex::new(TopicLog::default()),
            appended: Notify::new(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Records still retained
    pub fn len(&self) -> usize {
        self.log.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset the next published record will get
    pub fn end_offset(&self) -> u64 {
        self.log.lock().end()
    }

    /// Next offset the group will read after a restart, if it ever committed.
    pub fn committed(&self, group: &str) -> Option<u64> {
        self.log.lock().committed.get(group).copied()
    }

    /// Join `group`, resuming from its committed offset or the oldest
    /// retained record.
    pub fn subscribe(self: &Arc<Self>, group: impl Into<String>) -> InMemorySubscriber {
        let group = group.into();
        let position = {
            let mut log = self.log.lock();
            log.groups.insert(group.clone());
            log.committed.get(&group).copied().unwrap_or(log.base)
        };
        debug!(topic = %self.topic, group = %group, position, "Subscriber joined");
        InMemorySubscriber {
            broker: Arc::clone(self),
            group,
            position,
        }
    }

    /// Stop accepting records and wake every waiting subscriber.
    pub fn close(&self) {
        self.log.lock().closed = true;
        self.appended.notify_waiters();
    }

    fn closed_error(&self) -> BrokerError {
        BrokerError::Closed(self.topic.clone())
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        {
            let mut log = self.log.lock();
            if log.closed {
                return Err(self.closed_error());
            }
            log.records.push_back(Record {
                key: key.to_string(),
                payload,
            });
        }
        self.appended.notify_waiters();
        Ok(())
    }
}

/// A consumer-group member reading an `InMemoryBroker`.
pub struct InMemorySubscriber {
    broker: Arc<InMemoryBroker>,
    group: String,
    /// Next offset this member will fetch
    position: u64,
}

impl InMemorySubscriber {
    pub fn group(&self) -> &str {
        &self.group
    }

    fn try_next(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let log = self.broker.log.lock();
        // Another group's commit can't trim past us: our own group's
        // committed offset never exceeds our position.
        let index = self.position.checked_sub(log.base)? as usize;
        if let Some(record) = log.records.get(index) {
            let delivery = Delivery {
                key: record.key.clone(),
                payload: record.payload.clone(),
                partition: 0,
                offset: self.position,
                received_at: Utc::now(),
            };
            self.position += 1;
            return Some(Ok(delivery));
        }
        if log.closed {
            return Some(Err(self.broker.closed_error()));
        }
        None
    }
}

#[async_trait]
impl Subscriber for InMemorySubscriber {
    async fn fetch(&mut self) -> Result<Delivery, BrokerError> {
        let broker = Arc::clone(&self.broker);
        loop {
            // Register interest before checking so an append between the
            // check and the await still wakes us.
            let appended = broker.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(result) = self.try_next() {
                return result;
            }
            appended.await;
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<(), BrokerError> {
        if delivery.offset >= self.position {
            return Err(BrokerError::UnknownOffset {
                topic: self.broker.topic.clone(),
                offset: delivery.offset,
            });
        }
        let mut log = self.broker.log.lock();
        let next = log.committed.entry(self.group.clone()).or_insert(0);
        *next = (*next).max(delivery.offset + 1);
        let dropped = log.compact();
        if dropped > 0 {
            debug!(topic = %self.broker.topic, dropped, base = log.base, "Compacted log");
        }
        Ok(())
    }
}
