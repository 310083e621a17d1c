//! 进程内 broker 后端
//!
//! 实现与 rdkafka 后端相同的 `ClientFactory` / `TopicAdmin`，用于测试和没有
//! Kafka 集群时的本地运行。

pub mod broker;
pub mod client;

pub use broker::{BrokerStats, InMemoryBroker};
pub use client::{MemoryConsumer, MemoryProducer, OffsetReset};
