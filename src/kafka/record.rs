//! 生产/消费记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 待发送的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<String>,
    pub value: String,
}

impl ProducerRecord {
    /// 创建不带键的记录
    pub fn new(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// 从 broker 取回的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// 要提交的消费位置
///
/// `next_offset` 是该分区下一条要读取的 offset，即最后交付记录的 offset + 1。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOffset {
    pub topic: String,
    pub partition: i32,
    pub next_offset: i64,
}

impl CommitOffset {
    /// 交付 `record` 之后的位置
    pub fn after(record: &ConsumerRecord) -> Self {
        Self {
            topic: record.topic.clone(),
            partition: record.partition,
            next_offset: record.offset + 1,
        }
    }
}
