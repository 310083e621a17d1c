//! Kafka 消费者构建器
//!
//! 由 `ClientConfiguration` 构建 rdkafka 消费者，并适配为可唤醒的 `PollingConsumer`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorCode, Result};
use crate::kafka::client::{PollingConsumer, Wakeup};
use crate::kafka::client_config::{to_native, ClientConfiguration, Codec, CONSUMER_CODEC_KEYS};
use crate::kafka::record::{CommitOffset, ConsumerRecord};

/// 单次 `poll` 最多返回的记录数
pub const MAX_POLL_RECORDS: usize = 500;

/// 底层轮询切片，唤醒请求最迟在一个切片后被观察到
pub const POLL_SLICE: Duration = Duration::from_millis(10);

#[derive(Default)]
struct FlagWaker {
    requested: AtomicBool,
}

impl FlagWaker {
    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

impl Wakeup for FlagWaker {
    fn wakeup(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

/// rdkafka 消费者
pub struct RdKafkaConsumer {
    consumer: Option<BaseConsumer>,
    waker: Arc<FlagWaker>,
    pending_error: Option<ClientError>,
    max_poll_records: usize,
}

impl RdKafkaConsumer {
    #[must_use]
    pub fn with_max_poll_records(mut self, max: usize) -> Self {
        self.max_poll_records = max.max(1);
        self
    }

    fn inner(&self) -> Result<&BaseConsumer> {
        self.consumer
            .as_ref()
            .ok_or_else(|| ClientError::client_closed("consumer"))
    }
}

/// 构建 Kafka 消费者
///
/// # 参数
/// * `config` - 完整的消费者配置（通常由 `Defaults::resolve_consumer` 得到）
///
/// # 返回
/// * `Result<RdKafkaConsumer>` - 构建好的消费者（尚未订阅）
pub fn build_kafka_consumer(config: &ClientConfiguration) -> Result<RdKafkaConsumer> {
    Codec::check_all(config, CONSUMER_CODEC_KEYS)?;
    let consumer: BaseConsumer = to_native(config)?
        .set("enable.partition.eof", "false")
        .create()?;

    info!(
        bootstrap = %config.broker_address().unwrap_or("<unset>"),
        group = %config.get("group.id").unwrap_or("<unset>"),
        "Kafka consumer created successfully"
    );

    Ok(RdKafkaConsumer {
        consumer: Some(consumer),
        waker: Arc::new(FlagWaker::default()),
        pending_error: None,
        max_poll_records: MAX_POLL_RECORDS,
    })
}

impl PollingConsumer for RdKafkaConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.inner()?.subscribe(&[topic])?;
        info!(topic = %topic, "Successfully subscribed to Kafka topic");
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }

        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| ClientError::client_closed("consumer"))?;
        // 超出 Instant 表示范围时不设截止时间
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if self.waker.take() {
                return Err(ClientError::Interrupted);
            }

            let remaining = slice_for(deadline);
            match consumer.poll(remaining) {
                Some(Ok(message)) => {
                    let mut records = vec![to_record(&message)?];
                    while records.len() < self.max_poll_records {
                        match consumer.poll(Duration::ZERO) {
                            Some(Ok(message)) => records.push(to_record(&message)?),
                            Some(Err(err)) => {
                                // 先交付已取到的记录，错误留给下一次 poll
                                debug!(error = %err, "Deferring consumer error after partial batch");
                                self.pending_error = Some(err.into());
                                break;
                            }
                            None => break,
                        }
                    }
                    return Ok(records);
                }
                Some(Err(err)) => return Err(err.into()),
                None if deadline.is_some_and(|at| Instant::now() >= at) => return Ok(Vec::new()),
                None => {}
            }
        }
    }

    fn waker(&self) -> Arc<dyn Wakeup> {
        self.waker.clone()
    }

    fn commit(&mut self, offsets: &[CommitOffset]) -> Result<()> {
        let mut tpl = TopicPartitionList::with_capacity(offsets.len());
        for offset in offsets {
            tpl.add_partition_offset(&offset.topic, offset.partition, Offset::Offset(offset.next_offset))?;
        }
        self.inner()?.commit(&tpl, CommitMode::Sync)?;
        debug!(count = offsets.len(), "Committed consumer offsets");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            drop(consumer);
            info!("Kafka consumer closed");
        }
        Ok(())
    }
}

impl Drop for RdKafkaConsumer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Failed to close Kafka consumer on drop");
        }
    }
}

/// 下一次底层 poll 的等待时间
fn slice_for(deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(at) => at.saturating_duration_since(Instant::now()).min(POLL_SLICE),
        None => POLL_SLICE,
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> Result<ConsumerRecord> {
    let decode_error = |what: &str, err: std::str::Utf8Error| {
        ClientError::broker(
            ErrorCode::MessageDecodeFailed,
            format!("{} at {}:{}@{} is not UTF-8: {}", what, message.topic(), message.partition(), message.offset(), err),
        )
    };

    let key = match message.key_view::<str>() {
        None => None,
        Some(Ok(key)) => Some(key.to_string()),
        Some(Err(err)) => return Err(decode_error("key", err)),
    };
    let value = match message.payload_view::<str>() {
        None => String::new(),
        Some(Ok(value)) => value.to_string(),
        Some(Err(err)) => return Err(decode_error("value", err)),
    };

    Ok(ConsumerRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key,
        value,
        timestamp: message
            .timestamp()
            .to_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
    })
}
