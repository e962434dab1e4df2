//! Distribution Pipeline
//!
//! Two long-running loops coupled only through a broker topic:
//!
//! ```text
//!  provider ──► Producer ──publish(VIN)──► topic ──fetch──► Consumer ──► PriceStore
//!                                                              │   ▲          │
//!                                                              │   └─history──┘
//!                                                              ├──► ListingRepository
//!                                                              └──► commit
//! ```
//!
//! The producer seeds each record with one price point and no valuation. The
//! consumer owns valuation: it recomputes it from the full accumulated price
//! history before persisting.

pub mod broker;
pub mod config;
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod producer;

pub use broker::{BrokerError, Delivery, InMemoryBroker, InMemorySubscriber, Publisher, Subscriber};
pub use config::{BrokerBackend, PipelineConfig};
pub use consumer::{Consumer, ConsumerError, Processed, Stage};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaPublisher, KafkaSubscriber};
pub use producer::{IngestReport, Producer};
