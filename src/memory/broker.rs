//! 进程内 broker
//!
//! 每个主题一条有序日志（单分区），生产者追加，消费者在条件变量上做有界等待。
//! 只用于测试和本地运行，不涉及复制、再均衡和持久化。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{ClientError, ErrorCode, Result};
use crate::kafka::admin::{TopicAction, TopicAdmin, TopicCommand, DEFAULT_PARTITIONS, DEFAULT_REPLICATION_FACTOR};
use crate::kafka::client::ClientFactory;
use crate::kafka::client_config::{keys, ClientConfiguration, Codec, CONSUMER_CODEC_KEYS, PRODUCER_CODEC_KEYS};
use crate::memory::client::{MemoryConsumer, MemoryProducer, OffsetReset};

pub(crate) struct StoredRecord {
    pub(crate) key: Option<String>,
    pub(crate) value: String,
    pub(crate) timestamp: DateTime<Utc>,
}

pub(crate) struct TopicLog {
    pub(crate) partitions: u32,
    pub(crate) replication_factor: u16,
    pub(crate) records: Vec<StoredRecord>,
}

impl TopicLog {
    fn new(partitions: u32, replication_factor: u16) -> Self {
        Self {
            partitions,
            replication_factor,
            records: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct BrokerState {
    pub(crate) topics: BTreeMap<String, TopicLog>,
    /// (group, topic) → 下一条要读取的 offset
    pub(crate) committed: HashMap<(String, String), i64>,
}

#[derive(Default)]
struct Counters {
    producers_created: AtomicUsize,
    producers_closed: AtomicUsize,
    consumers_created: AtomicUsize,
    consumers_closed: AtomicUsize,
}

pub(crate) struct BrokerInner {
    state: Mutex<BrokerState>,
    pub(crate) arrived: Condvar,
    auto_create_topics: bool,
    counters: Counters,
}

impl BrokerInner {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, BrokerState>> {
        self.state
            .lock()
            .map_err(|_| ClientError::internal("in-memory broker state poisoned"))
    }

    pub(crate) fn auto_create_topics(&self) -> bool {
        self.auto_create_topics
    }

    /// 唤醒所有等待中的消费者
    ///
    /// 先短暂持有锁，保证等待方要么还没检查条件，要么已经进入等待。
    pub(crate) fn notify(&self) {
        drop(self.state.lock());
        self.arrived.notify_all();
    }

    pub(crate) fn producer_closed(&self) {
        self.counters.producers_closed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn consumer_closed(&self) {
        self.counters.consumers_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 客户端创建/释放计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub producers_created: usize,
    pub producers_closed: usize,
    pub consumers_created: usize,
    pub consumers_closed: usize,
}

/// 进程内 broker，克隆后共享同一份数据
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// 创建 broker，发送到不存在的主题时自动创建
    pub fn new() -> Self {
        Self::build(true)
    }

    /// 创建 broker，发送到不存在的主题时返回 `TopicNotFound`
    pub fn without_auto_create() -> Self {
        Self::build(false)
    }

    fn build(auto_create_topics: bool) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                state: Mutex::new(BrokerState::default()),
                arrived: Condvar::new(),
                auto_create_topics,
                counters: Counters::default(),
            }),
        }
    }

    pub fn stats(&self) -> BrokerStats {
        let c = &self.inner.counters;
        BrokerStats {
            producers_created: c.producers_created.load(Ordering::SeqCst),
            producers_closed: c.producers_closed.load(Ordering::SeqCst),
            consumers_created: c.consumers_created.load(Ordering::SeqCst),
            consumers_closed: c.consumers_closed.load(Ordering::SeqCst),
        }
    }

    /// 主题当前的记录数
    pub fn topic_len(&self, topic: &str) -> Result<Option<usize>> {
        Ok(self.inner.lock()?.topics.get(topic).map(|log| log.records.len()))
    }

    /// 主题的分区数和副本数
    pub fn topic_layout(&self, topic: &str) -> Result<Option<(u32, u16)>> {
        Ok(self
            .inner
            .lock()?
            .topics
            .get(topic)
            .map(|log| (log.partitions, log.replication_factor)))
    }

    /// 消费组在主题上已提交的 offset
    pub fn committed_offset(&self, group: &str, topic: &str) -> Result<Option<i64>> {
        Ok(self
            .inner
            .lock()?
            .committed
            .get(&(group.to_string(), topic.to_string()))
            .copied())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for InMemoryBroker {
    type Producer = MemoryProducer;
    type Consumer = MemoryConsumer;

    fn create_producer(&self, config: &ClientConfiguration) -> Result<Self::Producer> {
        Codec::check_all(config, PRODUCER_CODEC_KEYS)?;
        let client_id = config
            .get(keys::CLIENT_ID)
            .map(str::to_string)
            .unwrap_or_else(|| format!("producer-{}", uuid::Uuid::new_v4()));

        self.inner.counters.producers_created.fetch_add(1, Ordering::SeqCst);
        debug!(client_id = %client_id, "In-memory producer created");
        Ok(MemoryProducer::new(self.inner.clone(), client_id))
    }

    fn create_consumer(&self, config: &ClientConfiguration) -> Result<Self::Consumer> {
        Codec::check_all(config, CONSUMER_CODEC_KEYS)?;
        let reset = OffsetReset::from_config(config)?;
        let auto_commit = config.get_bool(keys::ENABLE_AUTO_COMMIT, true)?;
        let group_id = config.get(keys::GROUP_ID).map(str::to_string);
        let member_id = config
            .get(keys::CONSUMER_ID)
            .map(str::to_string)
            .unwrap_or_else(|| format!("consumer-{}", uuid::Uuid::new_v4()));

        self.inner.counters.consumers_created.fetch_add(1, Ordering::SeqCst);
        debug!(member_id = %member_id, group = ?group_id, "In-memory consumer created");
        Ok(MemoryConsumer::new(
            self.inner.clone(),
            member_id,
            group_id,
            auto_commit,
            reset,
        ))
    }
}

#[async_trait]
impl TopicAdmin for InMemoryBroker {
    async fn execute(&self, command: &TopicCommand) -> Result<Vec<String>> {
        let mut state = self.inner.lock()?;
        match &command.action {
            TopicAction::List => Ok(state.topics.keys().cloned().collect()),
            TopicAction::Create {
                topic,
                replication_factor,
                partitions,
            } => {
                if state.topics.contains_key(topic) {
                    return Err(ClientError::broker(
                        ErrorCode::TopicAlreadyExists,
                        format!("topic `{}` already exists", topic),
                    ));
                }
                state
                    .topics
                    .insert(topic.clone(), TopicLog::new(*partitions, *replication_factor));
                info!(topic = %topic, partitions, replication_factor, "Created topic");
                Ok(vec![topic.clone()])
            }
            TopicAction::Delete { topic } => {
                if state.topics.remove(topic).is_none() {
                    return Err(ClientError::topic_not_found(topic));
                }
                state.committed.retain(|(_, t), _| t != topic);
                info!(topic = %topic, "Deleted topic");
                Ok(vec![topic.clone()])
            }
        }
    }
}

/// 供生产者自动建主题使用
pub(crate) fn auto_created_log() -> TopicLog {
    TopicLog::new(DEFAULT_PARTITIONS, DEFAULT_REPLICATION_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::admin::AdminTarget;
    use crate::kafka::client::MessageProducer;
    use crate::kafka::record::ProducerRecord;

    fn target() -> AdminTarget {
        AdminTarget::Zookeeper("localhost:2181".into())
    }

    #[tokio::test]
    async fn admin_create_list_delete() {
        let broker = InMemoryBroker::new();
        broker
            .execute(&TopicCommand::create(target(), "b").with_partitions(3))
            .await
            .unwrap();
        broker.execute(&TopicCommand::create(target(), "a")).await.unwrap();

        assert_eq!(broker.execute(&TopicCommand::list(target())).await.unwrap(), ["a", "b"]);
        assert_eq!(broker.topic_layout("b").unwrap(), Some((3, 1)));

        broker.execute(&TopicCommand::delete(target(), "a")).await.unwrap();
        assert_eq!(broker.execute(&TopicCommand::list(target())).await.unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn admin_errors_come_from_broker() {
        let broker = InMemoryBroker::new();
        broker.execute(&TopicCommand::create(target(), "t")).await.unwrap();

        let dup = broker.execute(&TopicCommand::create(target(), "t")).await.unwrap_err();
        assert_eq!(dup.code(), ErrorCode::TopicAlreadyExists);

        let missing = broker.execute(&TopicCommand::delete(target(), "nope")).await.unwrap_err();
        assert_eq!(missing.code(), ErrorCode::TopicNotFound);
    }

    #[test]
    fn producer_without_auto_create_rejects_unknown_topic() {
        let broker = InMemoryBroker::without_auto_create();
        let mut producer = broker.create_producer(&ClientConfiguration::new()).unwrap();

        let err = producer.send(ProducerRecord::new("ghost", "x")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TopicNotFound);
        assert_eq!(broker.topic_len("ghost").unwrap(), None);
    }

    #[test]
    fn unsupported_codec_is_rejected_at_construction() {
        let broker = InMemoryBroker::new();
        let cfg = ClientConfiguration::new().with(keys::VALUE_DESERIALIZER, "protobuf");
        let err = broker.create_consumer(&cfg).map(|_| ()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedCodec);
        assert_eq!(broker.stats().consumers_created, 0);
    }
}
