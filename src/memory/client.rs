//! 进程内生产者和消费者

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorCode, Result};
use crate::kafka::client::{MessageProducer, PollingConsumer, Wakeup};
use crate::kafka::client_config::{keys, ClientConfiguration};
use crate::kafka::record::{CommitOffset, ConsumerRecord, ProducerRecord};
use crate::memory::broker::{auto_created_log, BrokerInner, StoredRecord};

/// 单次 `poll` 最多返回的记录数
pub const MAX_POLL_RECORDS: usize = 500;

/// 没有已提交 offset 时的起始位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    Earliest,
    Latest,
}

impl OffsetReset {
    pub(crate) fn from_config(config: &ClientConfiguration) -> Result<Self> {
        match config.get(keys::AUTO_OFFSET_RESET).map(str::trim) {
            Some("smallest") | Some("earliest") | Some("beginning") => Ok(OffsetReset::Earliest),
            Some("largest") | Some("latest") | Some("end") | None => Ok(OffsetReset::Latest),
            Some(other) => Err(ClientError::Configuration {
                code: ErrorCode::InvalidOption,
                reason: format!("invalid value `{}` for `{}`", other, keys::AUTO_OFFSET_RESET),
            }),
        }
    }
}

/// 进程内生产者
pub struct MemoryProducer {
    broker: Arc<BrokerInner>,
    client_id: String,
    closed: bool,
}

impl MemoryProducer {
    pub(crate) fn new(broker: Arc<BrokerInner>, client_id: String) -> Self {
        Self {
            broker,
            client_id,
            closed: false,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl MessageProducer for MemoryProducer {
    fn send(&mut self, record: ProducerRecord) -> Result<()> {
        if self.closed {
            return Err(ClientError::client_closed("producer"));
        }

        {
            let mut state = self.broker.lock()?;
            if !state.topics.contains_key(&record.topic) {
                if !self.broker.auto_create_topics() {
                    return Err(ClientError::topic_not_found(&record.topic));
                }
                debug!(topic = %record.topic, "Auto-creating topic");
                state.topics.insert(record.topic.clone(), auto_created_log());
            }
            if let Some(log) = state.topics.get_mut(&record.topic) {
                log.records.push(StoredRecord {
                    key: record.key,
                    value: record.value,
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        self.broker.arrived.notify_all();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.broker.producer_closed();
            debug!(client_id = %self.client_id, "In-memory producer closed");
        }
        Ok(())
    }
}

impl Drop for MemoryProducer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct MemoryWaker {
    pending: AtomicBool,
    broker: Arc<BrokerInner>,
}

impl Wakeup for MemoryWaker {
    fn wakeup(&self) {
        self.pending.store(true, Ordering::Release);
        self.broker.notify();
    }
}

/// 进程内消费者
pub struct MemoryConsumer {
    broker: Arc<BrokerInner>,
    member_id: String,
    group_id: Option<String>,
    auto_commit: bool,
    reset: OffsetReset,
    topic: Option<String>,
    position: i64,
    waker: Arc<MemoryWaker>,
    closed: bool,
}

impl MemoryConsumer {
    pub(crate) fn new(
        broker: Arc<BrokerInner>,
        member_id: String,
        group_id: Option<String>,
        auto_commit: bool,
        reset: OffsetReset,
    ) -> Self {
        let waker = Arc::new(MemoryWaker {
            pending: AtomicBool::new(false),
            broker: broker.clone(),
        });
        Self {
            broker,
            member_id,
            group_id,
            auto_commit,
            reset,
            topic: None,
            position: 0,
            waker,
            closed: false,
        }
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// 下一条要读取的 offset
    pub fn position(&self) -> i64 {
        self.position
    }

    fn commit_key(&self) -> Option<(String, String)> {
        match (&self.group_id, &self.topic) {
            (Some(group), Some(topic)) if self.auto_commit => Some((group.clone(), topic.clone())),
            _ => None,
        }
    }
}

impl PollingConsumer for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        if self.closed {
            return Err(ClientError::client_closed("consumer"));
        }

        let state = self.broker.lock()?;
        let committed = self
            .group_id
            .as_ref()
            .and_then(|group| state.committed.get(&(group.clone(), topic.to_string())).copied());
        let end = state
            .topics
            .get(topic)
            .map(|log| log.records.len() as i64)
            .unwrap_or(0);
        drop(state);

        self.position = match (committed, self.reset) {
            (Some(offset), _) => offset,
            (None, OffsetReset::Earliest) => 0,
            (None, OffsetReset::Latest) => end,
        };
        self.topic = Some(topic.to_string());

        info!(topic = %topic, member_id = %self.member_id, position = self.position, "Subscribed to topic");
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>> {
        if self.closed {
            return Err(ClientError::client_closed("consumer"));
        }
        let topic = self.topic.clone().ok_or_else(|| {
            ClientError::broker(ErrorCode::NotSubscribed, "consumer is not subscribed to any topic")
        })?;
        let commit_key = self.commit_key();
        // 超出 Instant 表示范围时不设截止时间
        let deadline = Instant::now().checked_add(timeout);

        let mut state = self.broker.lock()?;
        loop {
            if self.waker.pending.swap(false, Ordering::AcqRel) {
                return Err(ClientError::Interrupted);
            }

            let start = self.position.max(0) as usize;
            let batch: Vec<ConsumerRecord> = match state.topics.get(&topic) {
                Some(log) if log.records.len() > start => {
                    let end = (start + MAX_POLL_RECORDS).min(log.records.len());
                    log.records[start..end]
                        .iter()
                        .enumerate()
                        .map(|(i, stored)| ConsumerRecord {
                            topic: topic.clone(),
                            partition: 0,
                            offset: (start + i) as i64,
                            key: stored.key.clone(),
                            value: stored.value.clone(),
                            timestamp: Some(stored.timestamp),
                        })
                        .collect()
                }
                _ => Vec::new(),
            };

            if !batch.is_empty() {
                self.position = (start + batch.len()) as i64;
                if let Some(key) = commit_key {
                    state.committed.insert(key, self.position);
                }
                return Ok(batch);
            }

            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(Vec::new());
                    }
                    self.broker
                        .arrived
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| ClientError::internal("in-memory broker state poisoned"))?
                        .0
                }
                None => self
                    .broker
                    .arrived
                    .wait(state)
                    .map_err(|_| ClientError::internal("in-memory broker state poisoned"))?,
            };
        }
    }

    fn waker(&self) -> Arc<dyn Wakeup> {
        self.waker.clone()
    }

    fn commit(&mut self, offsets: &[CommitOffset]) -> Result<()> {
        if self.closed {
            return Err(ClientError::client_closed("consumer"));
        }

        let mut state = self.broker.lock()?;
        for offset in offsets {
            if self.topic.as_deref() == Some(offset.topic.as_str()) {
                self.position = offset.next_offset;
            }
            match &self.group_id {
                Some(group) => {
                    state
                        .committed
                        .insert((group.clone(), offset.topic.clone()), offset.next_offset);
                }
                None => debug!(topic = %offset.topic, "No group.id, position kept locally"),
            }
        }
        debug!(member_id = %self.member_id, count = offsets.len(), "Committed offsets");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(key) = self.commit_key() {
            match self.broker.lock() {
                Ok(mut state) => {
                    state.committed.insert(key, self.position);
                }
                Err(err) => warn!(error = %err, "Failed to commit position on close"),
            }
        }
        self.waker.pending.store(false, Ordering::Release);
        self.broker.consumer_closed();
        debug!(member_id = %self.member_id, "In-memory consumer closed");
        Ok(())
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::client::ClientFactory;
    use crate::memory::InMemoryBroker;

    fn consumer_config(reset: &str) -> ClientConfiguration {
        ClientConfiguration::new()
            .with(keys::GROUP_ID, "g")
            .with(keys::AUTO_OFFSET_RESET, reset)
    }

    fn produce(broker: &InMemoryBroker, topic: &str, values: &[&str]) {
        let mut producer = broker.create_producer(&ClientConfiguration::new()).unwrap();
        for v in values {
            producer.send(ProducerRecord::new(topic, *v)).unwrap();
        }
        producer.close().unwrap();
    }

    #[test]
    fn earliest_reads_existing_records_with_offsets() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["a", "b"]);

        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        let records = consumer.poll(Duration::from_millis(10)).unwrap();

        let got: Vec<_> = records.iter().map(|r| (r.offset, r.value.as_str())).collect();
        assert_eq!(got, [(0, "a"), (1, "b")]);
        assert_eq!(broker.committed_offset("g", "t").unwrap(), Some(2));
    }

    #[test]
    fn latest_skips_existing_records() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["old"]);

        let mut consumer = broker.create_consumer(&consumer_config("latest")).unwrap();
        consumer.subscribe("t").unwrap();
        assert!(consumer.poll(Duration::from_millis(5)).unwrap().is_empty());

        produce(&broker, "t", &["new"]);
        let records = consumer.poll(Duration::from_millis(50)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "new");
        assert_eq!(records[0].offset, 1);
    }

    #[test]
    fn committed_offset_wins_over_reset_policy() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["a", "b", "c"]);

        let mut first = broker.create_consumer(&consumer_config("earliest")).unwrap();
        first.subscribe("t").unwrap();
        assert_eq!(first.poll(Duration::from_millis(5)).unwrap().len(), 3);
        first.close().unwrap();

        produce(&broker, "t", &["d"]);
        let mut second = broker.create_consumer(&consumer_config("earliest")).unwrap();
        second.subscribe("t").unwrap();
        let records = second.poll(Duration::from_millis(5)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "d");
    }

    #[test]
    fn poll_blocks_until_record_arrives() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();

        let producer_broker = broker.clone();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            produce(&producer_broker, "t", &["late"]);
        });

        let records = consumer.poll(Duration::from_secs(5)).unwrap();
        sender.join().unwrap();
        assert_eq!(records[0].value, "late");
    }

    #[test]
    fn wakeup_interrupts_blocked_poll() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        let waker = consumer.waker();

        let started = Instant::now();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.wakeup();
        });

        let err = consumer.poll(Duration::from_secs(10)).unwrap_err();
        trigger.join().unwrap();
        assert!(matches!(err, ClientError::Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn wakeup_before_poll_is_not_lost() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        consumer.waker().wakeup();

        assert!(matches!(consumer.poll(Duration::from_secs(10)), Err(ClientError::Interrupted)));
        assert!(consumer.poll(Duration::from_millis(1)).unwrap().is_empty());
    }

    #[test]
    fn explicit_commit_without_auto_commit() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["a", "b", "c"]);

        let config = consumer_config("earliest").with(keys::ENABLE_AUTO_COMMIT, "false");
        let mut consumer = broker.create_consumer(&config).unwrap();
        consumer.subscribe("t").unwrap();
        let records = consumer.poll(Duration::from_millis(5)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(broker.committed_offset("g", "t").unwrap(), None);

        consumer.commit(&[CommitOffset::after(&records[0])]).unwrap();
        consumer.close().unwrap();
        assert_eq!(broker.committed_offset("g", "t").unwrap(), Some(1));
    }

    #[test]
    fn commit_rewinds_auto_committed_batch_end() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["a", "b", "c", "d"]);

        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        let records = consumer.poll(Duration::from_millis(5)).unwrap();
        assert_eq!(broker.committed_offset("g", "t").unwrap(), Some(4));

        consumer.commit(&[CommitOffset::after(&records[2])]).unwrap();
        consumer.close().unwrap();
        assert_eq!(broker.committed_offset("g", "t").unwrap(), Some(3));
    }

    #[test]
    fn unbounded_poll_returns_available_records() {
        let broker = InMemoryBroker::new();
        produce(&broker, "t", &["a"]);

        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        let records = consumer.poll(Duration::MAX).unwrap();
        assert_eq!(records[0].value, "a");
    }

    #[test]
    fn wakeup_interrupts_unbounded_poll() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.subscribe("t").unwrap();
        let waker = consumer.waker();

        let trigger = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.wakeup();
        });

        let err = consumer.poll(Duration::MAX).unwrap_err();
        trigger.join().unwrap();
        assert!(matches!(err, ClientError::Interrupted));
    }

    #[test]
    fn close_is_counted_once() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&consumer_config("earliest")).unwrap();
        consumer.close().unwrap();
        consumer.close().unwrap();
        drop(consumer);

        assert_eq!(broker.stats().consumers_closed, 1);
    }

    #[test]
    fn poll_without_subscription_fails() {
        let broker = InMemoryBroker::new();
        let mut consumer = broker.create_consumer(&ClientConfiguration::new()).unwrap();
        let err = consumer.poll(Duration::from_millis(1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotSubscribed);
    }

    #[test]
    fn invalid_offset_reset_is_rejected() {
        let broker = InMemoryBroker::new();
        let err = broker.create_consumer(&consumer_config("sometimes")).map(|_| ()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOption);
    }
}
