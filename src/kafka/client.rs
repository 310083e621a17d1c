//! 客户端抽象
//!
//! 所有后端（rdkafka、内存 broker）都实现这里的 trait，上层的发送、轮询循环、
//! 有界读取只依赖这些 trait。

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::kafka::client_config::ClientConfiguration;
use crate::kafka::record::{CommitOffset, ConsumerRecord, ProducerRecord};

/// 消息生产者
pub trait MessageProducer: Send {
    /// 发送一条记录（不等待投递确认）
    fn send(&mut self, record: ProducerRecord) -> Result<()>;

    /// 刷新并释放生产者
    ///
    /// 重复调用不产生任何效果。
    fn close(&mut self) -> Result<()>;
}

/// 唤醒句柄
///
/// 可以从任意线程调用，让正在进行（或下一次）的有界轮询立即以
/// `ClientError::Interrupted` 返回。
pub trait Wakeup: Send + Sync {
    fn wakeup(&self);
}

/// 支持有界等待轮询的消费者
pub trait PollingConsumer: Send {
    /// 订阅主题
    fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// 最多等待 `timeout`，返回零条或多条记录
    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>>;

    /// 获取唤醒句柄
    fn waker(&self) -> Arc<dyn Wakeup>;

    /// 同步提交消费组位置
    ///
    /// 只提交调用方实际拿到的记录，之后的 `close` 不会把位置推进到未交付的记录。
    fn commit(&mut self, offsets: &[CommitOffset]) -> Result<()>;

    /// 释放消费者
    ///
    /// 重复调用不产生任何效果。
    fn close(&mut self) -> Result<()>;
}

/// 客户端工厂
///
/// 由配置表构建生产者和消费者，对应被包装库的构造函数。
pub trait ClientFactory: Send + Sync {
    type Producer: MessageProducer + 'static;
    type Consumer: PollingConsumer + 'static;

    fn create_producer(&self, config: &ClientConfiguration) -> Result<Self::Producer>;

    fn create_consumer(&self, config: &ClientConfiguration) -> Result<Self::Consumer>;
}

impl<P: MessageProducer + ?Sized> MessageProducer for Box<P> {
    fn send(&mut self, record: ProducerRecord) -> Result<()> {
        (**self).send(record)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<C: PollingConsumer + ?Sized> PollingConsumer for Box<C> {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        (**self).subscribe(topic)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumerRecord>> {
        (**self).poll(timeout)
    }

    fn waker(&self) -> Arc<dyn Wakeup> {
        (**self).waker()
    }

    fn commit(&mut self, offsets: &[CommitOffset]) -> Result<()> {
        (**self).commit(offsets)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
