//! 各代客户端 API 的默认配置
//!
//! 每一代 API 对应一份不可变的 `Defaults` 记录，所有默认值都集中在这里，
//! 通过访问器和 `resolve_*` 使用，不在调用点散落魔法字符串。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kafka::client_config::{keys, resolve, ClientConfiguration, STRING_CODEC};

/// 客户端 API 代际
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// 0.8.x 风格：`metadata.broker.list`、`serializer.class`、zookeeper 寻址的消费者
    #[serde(alias = "0.8", alias = "eight")]
    Legacy,
    /// 0.9.x 风格：`bootstrap.servers`、显式键/值序列化器、消费组自动提交
    #[default]
    #[serde(alias = "0.9", alias = "nine")]
    Modern,
}

impl Generation {
    /// 对应的默认配置记录
    pub fn defaults(self) -> &'static Defaults {
        match self {
            Generation::Legacy => &LEGACY_DEFAULTS,
            Generation::Modern => &MODERN_DEFAULTS,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Legacy => write!(f, "legacy"),
            Generation::Modern => write!(f, "modern"),
        }
    }
}

type Table = &'static [(&'static str, &'static str)];

/// 默认 Zookeeper 地址
pub const DEFAULT_ZOOKEEPER_SERVER: &str = "localhost:2181";
/// 默认 Kafka 地址
pub const DEFAULT_KAFKA_SERVER: &str = "localhost:9092";
/// 默认主题
pub const DEFAULT_TOPIC: &str = "TestTopic";
/// 默认消费组
pub const DEFAULT_GROUP_ID: &str = "KafkaUtilsGroup";

/// 一代 API 的默认配置
#[derive(Debug)]
pub struct Defaults {
    generation: Generation,
    zookeeper_server: &'static str,
    kafka_server: &'static str,
    topic: &'static str,
    group_id: &'static str,
    producer: Table,
    consumer: Table,
}

/// 0.8.x 默认值
pub static LEGACY_DEFAULTS: Defaults = Defaults {
    generation: Generation::Legacy,
    zookeeper_server: DEFAULT_ZOOKEEPER_SERVER,
    kafka_server: DEFAULT_KAFKA_SERVER,
    topic: DEFAULT_TOPIC,
    group_id: DEFAULT_GROUP_ID,
    producer: &[
        (keys::METADATA_BROKER_LIST, DEFAULT_KAFKA_SERVER),
        (keys::SERIALIZER_CLASS, STRING_CODEC),
        (keys::REQUEST_REQUIRED_ACKS, "1"),
        (keys::REQUEST_TIMEOUT_MS, "50000"),
    ],
    consumer: &[
        (keys::ZOOKEEPER_CONNECT, DEFAULT_ZOOKEEPER_SERVER),
        // 旧版消费者只认 zookeeper，补充 broker 地址以便直连 broker 的后端可以构建
        (keys::METADATA_BROKER_LIST, DEFAULT_KAFKA_SERVER),
        (keys::GROUP_ID, DEFAULT_GROUP_ID),
        (keys::SOCKET_TIMEOUT_MS, "30000"),
        (keys::CONSUMER_ID, "KafkaUtilsConsumer"),
        (keys::AUTO_OFFSET_RESET, "smallest"),
    ],
};

/// 0.9.x 默认值
pub static MODERN_DEFAULTS: Defaults = Defaults {
    generation: Generation::Modern,
    zookeeper_server: DEFAULT_ZOOKEEPER_SERVER,
    kafka_server: DEFAULT_KAFKA_SERVER,
    topic: DEFAULT_TOPIC,
    group_id: DEFAULT_GROUP_ID,
    producer: &[
        (keys::BOOTSTRAP_SERVERS, DEFAULT_KAFKA_SERVER),
        (keys::ACKS, "all"),
        (keys::BUFFER_MEMORY, "33554432"),
        (keys::COMPRESSION_TYPE, "gzip"),
        (keys::RETRIES, "0"),
        (keys::BATCH_SIZE, "16384"),
        (keys::CLIENT_ID, "KafkaUtilsClient"),
        (keys::CONNECTIONS_MAX_IDLE_MS, "540000"),
        (keys::LINGER_MS, "0"),
        (keys::REQUEST_TIMEOUT_MS, "30000"),
        (keys::KEY_SERIALIZER, STRING_CODEC),
        (keys::VALUE_SERIALIZER, STRING_CODEC),
    ],
    consumer: &[
        (keys::BOOTSTRAP_SERVERS, DEFAULT_KAFKA_SERVER),
        (keys::GROUP_ID, DEFAULT_GROUP_ID),
        (keys::ENABLE_AUTO_COMMIT, "true"),
        (keys::AUTO_COMMIT_INTERVAL_MS, "1000"),
        (keys::SESSION_TIMEOUT_MS, "30000"),
        (keys::KEY_DESERIALIZER, STRING_CODEC),
        (keys::VALUE_DESERIALIZER, STRING_CODEC),
    ],
};

impl Defaults {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// 默认 Zookeeper 地址
    pub fn zookeeper_server(&self) -> &'static str {
        self.zookeeper_server
    }

    /// 默认 Kafka 地址
    pub fn kafka_server(&self) -> &'static str {
        self.kafka_server
    }

    /// 默认主题
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// 默认消费组
    pub fn group_id(&self) -> &'static str {
        self.group_id
    }

    /// 查询生产者默认值
    pub fn producer_default(&self, key: &str) -> Option<&'static str> {
        lookup(self.producer, key)
    }

    /// 查询消费者默认值
    pub fn consumer_default(&self, key: &str) -> Option<&'static str> {
        lookup(self.consumer, key)
    }

    /// 生产者默认配置
    pub fn producer_config(&self) -> ClientConfiguration {
        self.producer.iter().copied().collect()
    }

    /// 消费者默认配置
    pub fn consumer_config(&self) -> ClientConfiguration {
        self.consumer.iter().copied().collect()
    }

    /// 把覆盖项合并到生产者默认配置
    pub fn resolve_producer(&self, overrides: &ClientConfiguration) -> ClientConfiguration {
        resolve(&self.producer_config(), overrides)
    }

    /// 把覆盖项合并到消费者默认配置
    pub fn resolve_consumer(&self, overrides: &ClientConfiguration) -> ClientConfiguration {
        resolve(&self.consumer_config(), overrides)
    }
}

fn lookup(table: Table, key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_producer_defaults() {
        let cfg = LEGACY_DEFAULTS.producer_config();
        assert_eq!(cfg.get(keys::METADATA_BROKER_LIST), Some("localhost:9092"));
        assert_eq!(cfg.get(keys::SERIALIZER_CLASS), Some(STRING_CODEC));
        assert_eq!(cfg.get(keys::REQUEST_REQUIRED_ACKS), Some("1"));
        assert_eq!(cfg.get(keys::REQUEST_TIMEOUT_MS), Some("50000"));
        assert_eq!(cfg.len(), 4);
    }

    #[test]
    fn legacy_consumer_defaults() {
        let d = Generation::Legacy.defaults();
        assert_eq!(d.consumer_default(keys::ZOOKEEPER_CONNECT), Some("localhost:2181"));
        assert_eq!(d.consumer_default(keys::AUTO_OFFSET_RESET), Some("smallest"));
        assert_eq!(d.consumer_default(keys::CONSUMER_ID), Some("KafkaUtilsConsumer"));
        assert_eq!(d.consumer_default(keys::SOCKET_TIMEOUT_MS), Some("30000"));
        assert_eq!(d.consumer_default(keys::ENABLE_AUTO_COMMIT), None);
    }

    #[test]
    fn modern_producer_defaults() {
        let d = Generation::Modern.defaults();
        assert_eq!(d.producer_default(keys::ACKS), Some("all"));
        assert_eq!(d.producer_default(keys::BUFFER_MEMORY), Some("33554432"));
        assert_eq!(d.producer_default(keys::COMPRESSION_TYPE), Some("gzip"));
        assert_eq!(d.producer_default(keys::BATCH_SIZE), Some("16384"));
        assert_eq!(d.producer_default(keys::CONNECTIONS_MAX_IDLE_MS), Some("540000"));
        assert_eq!(d.producer_config().len(), 12);
    }

    #[test]
    fn modern_consumer_defaults() {
        let cfg = MODERN_DEFAULTS.consumer_config();
        assert_eq!(cfg.get(keys::GROUP_ID), Some(DEFAULT_GROUP_ID));
        assert_eq!(cfg.get(keys::ENABLE_AUTO_COMMIT), Some("true"));
        assert_eq!(cfg.get(keys::AUTO_COMMIT_INTERVAL_MS), Some("1000"));
        assert_eq!(cfg.get(keys::VALUE_DESERIALIZER), Some(STRING_CODEC));
    }

    #[test]
    fn shared_accessors() {
        for d in [&LEGACY_DEFAULTS, &MODERN_DEFAULTS] {
            assert_eq!(d.zookeeper_server(), "localhost:2181");
            assert_eq!(d.kafka_server(), "localhost:9092");
            assert_eq!(d.topic(), "TestTopic");
        }
    }

    #[test]
    fn resolve_consumer_keeps_other_defaults() {
        let overrides = ClientConfiguration::new().with(keys::GROUP_ID, "orders");
        let cfg = MODERN_DEFAULTS.resolve_consumer(&overrides);

        assert_eq!(cfg.get(keys::GROUP_ID), Some("orders"));
        for (key, value) in MODERN_DEFAULTS.consumer_config().iter() {
            if key != keys::GROUP_ID {
                assert_eq!(cfg.get(key), Some(value), "default for {key} changed");
            }
        }
    }

    #[test]
    fn generation_deserializes_from_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            generation: Generation,
        }
        let w: Wrapper = toml::from_str(r#"generation = "0.8""#).unwrap();
        assert_eq!(w.generation, Generation::Legacy);
        let w: Wrapper = toml::from_str(r#"generation = "modern""#).unwrap();
        assert_eq!(w.generation, Generation::Modern);
    }
}
