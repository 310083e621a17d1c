//! Kafka Utils Library
//!
//! Thin convenience layer over Kafka clients: per-generation default configuration
//! (0.8 legacy and 0.9 modern client APIs), a polling consumer loop that can be shut
//! down from any thread, bounded "read N messages" with deadline and cancellation,
//! and topic administration (list/create/delete).
//!
//! The librdkafka backend is behind the `kafka` feature. The `memory` backend runs
//! in-process and needs no broker.

pub mod config;
pub mod error;
pub mod logging;
pub mod memory;

// 客户端封装
pub mod kafka;

// 消费运行时
pub mod runtime;

// Re-exports
pub use config::{LoggingConfig, UtilsConfig};
pub use error::{ClientError, ErrorCategory, ErrorCode, Result};
pub use kafka::{
    AdminTarget, ClientConfiguration, ClientFactory, ConsumerRecord, Generation, KafkaUtils,
    MessageProducer, PollingConsumer, ProducerRecord, TopicAdmin, TopicCommand,
};
pub use logging::init_tracing;
pub use memory::InMemoryBroker;
pub use runtime::{ConsumerLoop, ConsumerLoopHandle, LoopConfig, LoopState, ShutdownHandle};

#[cfg(feature = "kafka")]
pub use kafka::{RdKafkaFactory, RdKafkaTopicAdmin};
