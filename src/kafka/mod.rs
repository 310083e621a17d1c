//! Kafka 客户端封装
//!
//! - `defaults`：两代客户端 API（0.8 / 0.9）的默认配置表和合并函数
//! - `client`：生产者/消费者/工厂 trait，所有后端都实现它们
//! - `producer`：批量发送
//! - `admin`：主题的列出/创建/删除
//! - `utils`：绑定某一代默认配置的门面
//!
//! 基于 librdkafka 的后端需要启用 `kafka` feature。

pub mod admin;
pub mod client;
pub mod client_config;
pub mod defaults;
pub mod producer;
pub mod record;
pub mod utils;

#[cfg(feature = "kafka")]
pub mod consumer_builder;
#[cfg(feature = "kafka")]
pub mod factory;
#[cfg(feature = "kafka")]
pub mod producer_builder;

pub use admin::{run_topic_command, AdminTarget, ScriptTopicAdmin, TopicAction, TopicAdmin, TopicCommand};
pub use client::{ClientFactory, MessageProducer, PollingConsumer, Wakeup};
pub use client_config::{resolve, ClientConfiguration, Codec};
pub use defaults::{Defaults, Generation};
pub use producer::send_all;
pub use record::{CommitOffset, ConsumerRecord, ProducerRecord};
pub use utils::KafkaUtils;

#[cfg(feature = "kafka")]
pub use admin::RdKafkaTopicAdmin;
#[cfg(feature = "kafka")]
pub use consumer_builder::{build_kafka_consumer, RdKafkaConsumer};
#[cfg(feature = "kafka")]
pub use factory::RdKafkaFactory;
#[cfg(feature = "kafka")]
pub use producer_builder::{build_kafka_producer, RdKafkaProducer};
