//! Kafka 生产者构建器
//!
//! 由 `ClientConfiguration` 构建 rdkafka 生产者，并适配为 `MessageProducer`

use std::time::Duration;

use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::kafka::client::MessageProducer;
use crate::kafka::client_config::{to_native, ClientConfiguration, Codec, PRODUCER_CODEC_KEYS};
use crate::kafka::record::ProducerRecord;

/// 关闭时等待未完成投递的最长时间
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// rdkafka 生产者
pub struct RdKafkaProducer {
    producer: Option<BaseProducer>,
    flush_timeout: Duration,
}

impl RdKafkaProducer {
    /// 设置关闭时的 flush 超时
    #[must_use]
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

/// 构建 Kafka 生产者
///
/// # 参数
/// * `config` - 完整的生产者配置（通常由 `Defaults::resolve_producer` 得到）
///
/// # 返回
/// * `Result<RdKafkaProducer>` - 构建好的生产者，非法选项由 librdkafka 报告
pub fn build_kafka_producer(config: &ClientConfiguration) -> Result<RdKafkaProducer> {
    Codec::check_all(config, PRODUCER_CODEC_KEYS)?;
    let producer: BaseProducer = to_native(config)?.create()?;

    info!(
        bootstrap = %config.broker_address().unwrap_or("<unset>"),
        options = config.len(),
        "Kafka producer created successfully"
    );

    Ok(RdKafkaProducer {
        producer: Some(producer),
        flush_timeout: DEFAULT_FLUSH_TIMEOUT,
    })
}

impl MessageProducer for RdKafkaProducer {
    fn send(&mut self, record: ProducerRecord) -> Result<()> {
        let producer = self
            .producer
            .as_ref()
            .ok_or_else(|| ClientError::client_closed("producer"))?;

        let mut base = BaseRecord::<str, str>::to(&record.topic).payload(record.value.as_str());
        if let Some(key) = record.key.as_deref() {
            base = base.key(key);
        }
        producer.send(base).map_err(|(err, _)| ClientError::from(err))?;

        // 处理已完成的投递回调，不阻塞
        producer.poll(Duration::ZERO);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(producer) = self.producer.take() {
            producer.flush(self.flush_timeout)?;
            info!("Kafka producer closed");
        }
        Ok(())
    }
}

impl Drop for RdKafkaProducer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Failed to flush Kafka producer on drop");
        }
    }
}
