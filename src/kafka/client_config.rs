//! Kafka 客户端配置
//!
//! `ClientConfiguration` 是交给生产者/消费者构造函数的选项表（选项名 → 字符串值），
//! `resolve` 把调用方的覆盖项合并到默认表上。这里不校验选项的取值，非法值由
//! 具体后端在构建客户端时报告。

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ClientError, ErrorCode, Result};

/// 常用配置项名称
pub mod keys {
    pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
    pub const METADATA_BROKER_LIST: &str = "metadata.broker.list";
    pub const ZOOKEEPER_CONNECT: &str = "zookeeper.connect";

    pub const ACKS: &str = "acks";
    pub const REQUEST_REQUIRED_ACKS: &str = "request.required.acks";
    pub const BUFFER_MEMORY: &str = "buffer.memory";
    pub const COMPRESSION_TYPE: &str = "compression.type";
    pub const RETRIES: &str = "retries";
    pub const BATCH_SIZE: &str = "batch.size";
    pub const CLIENT_ID: &str = "client.id";
    pub const CONNECTIONS_MAX_IDLE_MS: &str = "connections.max.idle.ms";
    pub const LINGER_MS: &str = "linger.ms";
    pub const REQUEST_TIMEOUT_MS: &str = "request.timeout.ms";
    pub const SOCKET_TIMEOUT_MS: &str = "socket.timeout.ms";

    pub const KEY_SERIALIZER: &str = "key.serializer";
    pub const VALUE_SERIALIZER: &str = "value.serializer";
    pub const SERIALIZER_CLASS: &str = "serializer.class";
    pub const KEY_DESERIALIZER: &str = "key.deserializer";
    pub const VALUE_DESERIALIZER: &str = "value.deserializer";

    pub const GROUP_ID: &str = "group.id";
    pub const CONSUMER_ID: &str = "consumer.id";
    pub const ENABLE_AUTO_COMMIT: &str = "enable.auto.commit";
    pub const AUTO_COMMIT_INTERVAL_MS: &str = "auto.commit.interval.ms";
    pub const SESSION_TIMEOUT_MS: &str = "session.timeout.ms";
    pub const AUTO_OFFSET_RESET: &str = "auto.offset.reset";
}

/// 只在本地解释、不转发给 librdkafka 的配置项
pub const LOCAL_KEYS: &[&str] = &[
    keys::KEY_SERIALIZER,
    keys::VALUE_SERIALIZER,
    keys::SERIALIZER_CLASS,
    keys::KEY_DESERIALIZER,
    keys::VALUE_DESERIALIZER,
    keys::ZOOKEEPER_CONNECT,
    keys::CONSUMER_ID,
];

/// 内置的 UTF-8 字符串编解码器标识
pub const STRING_CODEC: &str = "string";

/// Kafka 客户端配置表
///
/// 键按字典序保存，便于日志输出和比较。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfiguration {
    entries: BTreeMap<String, String>,
}

impl ClientConfiguration {
    /// 创建空配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置单个选项（链式）
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// 设置单个选项，返回被替换的旧值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// 读取选项
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 以当前配置为基础合并覆盖项
    #[must_use]
    pub fn merged(&self, overrides: &ClientConfiguration) -> ClientConfiguration {
        resolve(self, overrides)
    }

    /// 读取必填选项
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| ClientError::configuration(format!("missing required option `{}`", key)))
    }

    /// 读取布尔选项，缺省时返回 `default`
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.trim().parse::<bool>().map_err(|_| {
                ClientError::configuration(format!("option `{}` expects a boolean, got `{}`", key, v))
            }),
        }
    }

    /// Broker 地址，新版键优先
    pub fn broker_address(&self) -> Option<&str> {
        self.get(keys::BOOTSTRAP_SERVERS)
            .or_else(|| self.get(keys::METADATA_BROKER_LIST))
    }
}

impl<K, V> FromIterator<(K, V)> for ClientConfiguration
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for ClientConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// 合并配置
///
/// 从 `defaults` 出发，用 `overrides` 中出现的每个键替换对应值，其余键保持默认。
pub fn resolve(defaults: &ClientConfiguration, overrides: &ClientConfiguration) -> ClientConfiguration {
    let mut merged = defaults.clone();
    for (key, value) in overrides.iter() {
        merged.set(key, value);
    }
    merged
}

/// 记录键/值的编解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// UTF-8 字符串
    String,
}

impl Codec {
    /// 解析编解码器标识
    pub fn parse(key: &str, id: &str) -> Result<Self> {
        match id.trim() {
            STRING_CODEC => Ok(Codec::String),
            other => Err(ClientError::unsupported_codec(key, other)),
        }
    }

    /// 检查配置中出现的全部编解码器标识，缺省视为字符串
    pub fn check_all(config: &ClientConfiguration, codec_keys: &[&str]) -> Result<Self> {
        for key in codec_keys {
            if let Some(id) = config.get(key) {
                Self::parse(key, id)?;
            }
        }
        Ok(Codec::String)
    }
}

/// 计算转发给 librdkafka 的选项
///
/// 本地键被剔除，`buffer.memory`（字节）换算为 `queue.buffering.max.kbytes`。
pub fn forwarded_entries(config: &ClientConfiguration) -> Result<Vec<(String, String)>> {
    let mut forwarded = Vec::with_capacity(config.len());
    for (key, value) in config.iter() {
        if LOCAL_KEYS.iter().any(|local| *local == key) {
            continue;
        }
        if key == keys::BUFFER_MEMORY {
            let bytes: u64 = value.trim().parse().map_err(|_| {
                ClientError::Configuration {
                    code: ErrorCode::InvalidOption,
                    reason: format!("option `{}` expects a byte count, got `{}`", key, value),
                }
            })?;
            forwarded.push(("queue.buffering.max.kbytes".to_string(), (bytes / 1024).max(1).to_string()));
            continue;
        }
        forwarded.push((key.to_string(), value.to_string()));
    }
    Ok(forwarded)
}

/// 构建 rdkafka 原生配置
#[cfg(feature = "kafka")]
pub fn to_native(config: &ClientConfiguration) -> Result<rdkafka::config::ClientConfig> {
    let mut native = rdkafka::config::ClientConfig::new();
    for (key, value) in forwarded_entries(config)? {
        native.set(key, value);
    }
    Ok(native)
}

/// 生产者侧的编解码器键
pub const PRODUCER_CODEC_KEYS: &[&str] = &[
    keys::KEY_SERIALIZER,
    keys::VALUE_SERIALIZER,
    keys::SERIALIZER_CLASS,
];

/// 消费者侧的编解码器键
pub const CONSUMER_CODEC_KEYS: &[&str] = &[keys::KEY_DESERIALIZER, keys::VALUE_DESERIALIZER];
