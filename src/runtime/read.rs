//! 有界读取
//!
//! 在轮询循环之上读取固定条数的消息，带截止时间和取消令牌。

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::kafka::client::PollingConsumer;
use crate::kafka::record::ConsumerRecord;
use crate::runtime::config::LoopConfig;
use crate::runtime::consumer_loop::ConsumerLoop;

enum Outcome {
    Collected,
    DeadlineElapsed,
    Cancelled,
}

/// 从 `topic` 读取 `expected` 条消息的值
///
/// 按到达顺序返回。达到截止时间返回 `ClientError::Timeout`，令牌被取消返回
/// `ClientError::Cancelled`，循环因客户端错误提前结束时原样返回该错误。
/// 无论结果如何，返回前都会停止循环并释放消费者。
///
/// 循环只交付 `expected` 条记录，并只为这些记录提交消费组位置，
/// 同一批次中多取到的记录留给下一次读取。
pub async fn read_expected<C>(
    consumer: C,
    topic: &str,
    expected: usize,
    config: &LoopConfig,
    cancel: CancellationToken,
) -> Result<Vec<String>>
where
    C: PollingConsumer + 'static,
{
    if expected == 0 {
        let mut consumer = consumer;
        consumer.close()?;
        return Ok(Vec::new());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = ConsumerLoop::new(consumer, topic)
        .with_config(config.clone())
        .with_record_limit(expected)
        .with_handler(move |record: &ConsumerRecord| {
            // 接收端已结束时丢弃
            let _ = tx.send(record.value.clone());
        })
        .spawn()?;

    let started = Instant::now();
    let mut messages = Vec::with_capacity(expected);

    let outcome = tokio::select! {
        _ = collect(&mut rx, &mut messages, expected) => Outcome::Collected,
        _ = tokio::time::sleep(config.read_timeout) => Outcome::DeadlineElapsed,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    handle.shutdown();
    let joined = tokio::task::spawn_blocking(move || handle.join()).await?;
    let elapsed = started.elapsed();

    match outcome {
        Outcome::Collected if messages.len() == expected => {
            if let Err(err) = joined {
                warn!(topic = %topic, error = %err, "Consumer loop reported an error after all messages arrived");
            }
            debug!(topic = %topic, count = messages.len(), elapsed_ms = elapsed.as_millis() as u64, "Read completed");
            Ok(messages)
        }
        // 循环提前结束，通道被关闭
        Outcome::Collected => {
            joined?;
            Err(ClientError::Timeout {
                expected,
                received: messages.len(),
                elapsed,
            })
        }
        Outcome::DeadlineElapsed => {
            if let Err(err) = joined {
                warn!(topic = %topic, error = %err, "Consumer loop failed while waiting for messages");
            }
            warn!(topic = %topic, expected, received = messages.len(), "Timed out waiting for messages");
            Err(ClientError::Timeout {
                expected,
                received: messages.len(),
                elapsed,
            })
        }
        Outcome::Cancelled => {
            info!(topic = %topic, received = messages.len(), "Read cancelled");
            Err(ClientError::Cancelled)
        }
    }
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<String>, messages: &mut Vec<String>, expected: usize) {
    while messages.len() < expected {
        match rx.recv().await {
            Some(message) => {
                info!(value = %message, "Received message: {}.", message);
                messages.push(message);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::error::ErrorCode;
    use crate::kafka::client::{ClientFactory, MessageProducer, Wakeup};
    use crate::kafka::client_config::{keys, ClientConfiguration};
    use crate::kafka::record::{CommitOffset, ProducerRecord};
    use crate::memory::InMemoryBroker;

    fn config() -> LoopConfig {
        LoopConfig::default()
            .with_poll_timeout(Duration::from_millis(10))
            .with_read_timeout(Duration::from_millis(500))
    }

    fn earliest() -> ClientConfiguration {
        ClientConfiguration::new()
            .with(keys::GROUP_ID, "read-test")
            .with(keys::AUTO_OFFSET_RESET, "smallest")
    }

    struct NoopWaker;

    impl Wakeup for NoopWaker {
        fn wakeup(&self) {}
    }

    /// 订阅成功，第一次 poll 就失败
    struct BrokenConsumer {
        closes: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl PollingConsumer for BrokenConsumer {
        fn subscribe(&mut self, _topic: &str) -> Result<()> {
            Ok(())
        }

        fn poll(&mut self, _timeout: Duration) -> Result<Vec<ConsumerRecord>> {
            Err(ClientError::broker(ErrorCode::BrokerUnavailable, "connection refused"))
        }

        fn waker(&self) -> Arc<dyn Wakeup> {
            Arc::new(NoopWaker)
        }

        fn commit(&mut self, _offsets: &[CommitOffset]) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn reads_exact_count_in_order() {
        let broker = InMemoryBroker::new();
        let mut producer = broker.create_producer(&ClientConfiguration::new()).unwrap();
        for v in ["1", "2", "3", "4"] {
            producer.send(ProducerRecord::new("t", v)).unwrap();
        }

        let consumer = broker.create_consumer(&earliest()).unwrap();
        let read = read_expected(consumer, "t", 3, &config(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read, ["1", "2", "3"]);
        assert_eq!(broker.stats().consumers_closed, 1);
        // 自动提交的批次末尾被回退到最后交付的记录之后
        assert_eq!(broker.committed_offset("read-test", "t").unwrap(), Some(3));

        let consumer = broker.create_consumer(&earliest()).unwrap();
        let rest = read_expected(consumer, "t", 1, &config(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rest, ["4"]);
        assert_eq!(broker.committed_offset("read-test", "t").unwrap(), Some(4));
    }

    #[tokio::test]
    async fn manual_commit_consumer_commits_delivered_records() {
        let broker = InMemoryBroker::new();
        let mut producer = broker.create_producer(&ClientConfiguration::new()).unwrap();
        for v in ["1", "2", "3"] {
            producer.send(ProducerRecord::new("t", v)).unwrap();
        }

        let manual = earliest().with(keys::ENABLE_AUTO_COMMIT, "false");
        let consumer = broker.create_consumer(&manual).unwrap();
        let read = read_expected(consumer, "t", 2, &config(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(read, ["1", "2"]);
        assert_eq!(broker.committed_offset("read-test", "t").unwrap(), Some(2));
    }

    #[tokio::test]
    async fn timed_out_manual_read_commits_nothing() {
        let broker = InMemoryBroker::new();
        let mut producer = broker.create_producer(&ClientConfiguration::new()).unwrap();
        producer.send(ProducerRecord::new("t", "1")).unwrap();

        let manual = earliest().with(keys::ENABLE_AUTO_COMMIT, "false");
        let consumer = broker.create_consumer(&manual).unwrap();
        let err = read_expected(consumer, "t", 2, &config(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(broker.committed_offset("read-test", "t").unwrap(), None);
    }

    #[tokio::test]
    async fn broker_failure_is_returned_unchanged() {
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let consumer = BrokenConsumer { closes: closes.clone() };

        let err = read_expected(consumer, "t", 2, &config(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BrokerUnavailable);
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_returns_cancelled() {
        let broker = InMemoryBroker::new();
        let consumer = broker.create_consumer(&earliest()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = read_expected(consumer, "t", 1, &config(), cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(broker.stats().consumers_closed, 1);
    }

    #[tokio::test]
    async fn empty_topic_times_out() {
        let broker = InMemoryBroker::new();
        let consumer = broker.create_consumer(&earliest()).unwrap();

        let err = read_expected(consumer, "t", 1, &config(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(broker.stats().consumers_closed, 1);
    }
}
