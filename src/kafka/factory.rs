//! rdkafka 客户端工厂

use crate::error::Result;
use crate::kafka::client::ClientFactory;
use crate::kafka::client_config::ClientConfiguration;
use crate::kafka::consumer_builder::{build_kafka_consumer, RdKafkaConsumer};
use crate::kafka::producer_builder::{build_kafka_producer, RdKafkaProducer};

/// 基于 librdkafka 的客户端工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct RdKafkaFactory;

impl ClientFactory for RdKafkaFactory {
    type Producer = RdKafkaProducer;
    type Consumer = RdKafkaConsumer;

    fn create_producer(&self, config: &ClientConfiguration) -> Result<Self::Producer> {
        build_kafka_producer(config)
    }

    fn create_consumer(&self, config: &ClientConfiguration) -> Result<Self::Consumer> {
        build_kafka_consumer(config)
    }
}
