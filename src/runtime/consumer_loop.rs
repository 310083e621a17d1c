//! 后台轮询消费循环
//!
//! 状态机：`Created -> Running -> Stopping -> Stopped`
//!
//! - `Created`：持有已配置好的消费者和目标主题，尚未启动
//! - `Running`：订阅主题后反复进行有界等待的 poll，每条记录交给处理器
//! - `Stopping`：`shutdown()` 置位关闭标志并唤醒正在进行的 poll
//! - `Stopped`：终态，消费者已被释放
//!
//! 关闭标志是唯一的跨线程共享数据，只能从 false 变为 true。
//!
//! 设置了记录上限时，循环交付够条数后同步提交已交付记录的位置并自行进入 `Stopping`。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::kafka::client::{PollingConsumer, Wakeup};
use crate::kafka::record::{CommitOffset, ConsumerRecord};
use crate::runtime::config::LoopConfig;
use crate::runtime::handler::{LogRecordHandler, RecordHandler};

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Created,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Created => "created",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
            LoopState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

struct LoopShared {
    closed: AtomicBool,
    state: AtomicU8,
    waker: Arc<dyn Wakeup>,
}

impl LoopShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// 关闭句柄
///
/// 可以克隆并从任意线程调用，重复调用没有副作用。
#[derive(Clone)]
pub struct ShutdownHandle {
    shared: Arc<LoopShared>,
}

impl ShutdownHandle {
    /// 请求关闭循环并唤醒正在进行的 poll
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already requested");
            return;
        }
        self.shared.transition(LoopState::Running, LoopState::Stopping);
        self.shared.waker.wakeup();
        debug!("Shutdown requested, consumer woken up");
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("closed", &self.shared.is_closed())
            .field("state", &self.shared.state())
            .finish()
    }
}

/// `run_until` 的 future 被提前丢弃时仍然停止循环
struct ShutdownOnDrop(ShutdownHandle);

impl Drop for ShutdownOnDrop {
    fn drop(&mut self) {
        if self.0.state() != LoopState::Stopped {
            self.0.shutdown();
        }
    }
}

/// 后台轮询消费循环
pub struct ConsumerLoop<C, H = LogRecordHandler> {
    consumer: C,
    topic: String,
    handler: H,
    config: LoopConfig,
    record_limit: Option<usize>,
    shared: Arc<LoopShared>,
}

impl<C: PollingConsumer> ConsumerLoop<C, LogRecordHandler> {
    /// 创建循环（`Created` 状态），默认处理器只记录日志
    pub fn new(consumer: C, topic: impl Into<String>) -> Self {
        let shared = Arc::new(LoopShared {
            closed: AtomicBool::new(false),
            state: AtomicU8::new(LoopState::Created as u8),
            waker: consumer.waker(),
        });
        Self {
            consumer,
            topic: topic.into(),
            handler: LogRecordHandler,
            config: LoopConfig::default(),
            record_limit: None,
            shared,
        }
    }
}

impl<C, H> ConsumerLoop<C, H>
where
    C: PollingConsumer,
    H: RecordHandler,
{
    /// 替换记录处理器
    pub fn with_handler<H2: RecordHandler>(self, handler: H2) -> ConsumerLoop<C, H2> {
        ConsumerLoop {
            consumer: self.consumer,
            topic: self.topic,
            handler,
            config: self.config,
            record_limit: self.record_limit,
            shared: self.shared,
        }
    }

    /// 设置循环配置
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// 最多交付 `limit` 条记录
    ///
    /// 达到上限后提交已交付记录的位置并停止，同一批次里多取到的记录不会交给处理器。
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = Some(limit);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    /// 获取关闭句柄
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// 在当前线程运行循环，直到被关闭或出错
    ///
    /// 无论以何种方式结束，返回前都会释放消费者。
    pub fn run(mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);

        if shared.is_closed() {
            info!(topic = %self.topic, "Shutdown requested before start, releasing consumer");
            shared.set_state(LoopState::Stopping);
            self.release();
            shared.set_state(LoopState::Stopped);
            return Ok(());
        }

        shared.transition(LoopState::Created, LoopState::Running);
        info!(topic = %self.topic, poll_timeout_ms = self.config.poll_timeout.as_millis() as u64, "Consumer loop started");

        let result = self.poll_until_closed();

        shared.set_state(LoopState::Stopping);
        self.release();
        shared.set_state(LoopState::Stopped);

        match &result {
            Ok(()) => info!(topic = %self.topic, "Consumer loop stopped"),
            Err(err) => error!(topic = %self.topic, error = %err, "Consumer loop failed"),
        }
        result
    }

    fn poll_until_closed(&mut self) -> Result<()> {
        self.consumer.subscribe(&self.topic)?;

        let mut timeouts: u64 = 0;
        let mut delivered: usize = 0;
        let mut positions: BTreeMap<(String, i32), i64> = BTreeMap::new();
        if self.record_limit == Some(0) {
            return self.stop_at_limit(&positions);
        }

        while !self.shared.is_closed() {
            match self.consumer.poll(self.config.poll_timeout) {
                Ok(records) if records.is_empty() => {
                    timeouts += 1;
                }
                Ok(records) => {
                    info!(
                        topic = %self.topic,
                        count = records.len(),
                        timeouts = timeouts,
                        "Got {} records after {} timeouts.",
                        records.len(),
                        timeouts
                    );
                    timeouts = 0;
                    let take = match self.record_limit {
                        Some(limit) => records.len().min(limit - delivered),
                        None => records.len(),
                    };
                    for record in &records[..take] {
                        self.handler.handle(record);
                        track_position(&mut positions, record);
                    }
                    delivered += take;
                    if self.record_limit == Some(delivered) {
                        return self.stop_at_limit(&positions);
                    }
                }
                Err(ClientError::Interrupted) => {
                    if self.shared.is_closed() {
                        debug!(topic = %self.topic, "Wakeup observed while stopping");
                        break;
                    }
                    warn!(topic = %self.topic, "Consumer woken up while running");
                    return Err(ClientError::Interrupted);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn stop_at_limit(&mut self, positions: &BTreeMap<(String, i32), i64>) -> Result<()> {
        let offsets: Vec<CommitOffset> = positions
            .iter()
            .map(|((topic, partition), next_offset)| CommitOffset {
                topic: topic.clone(),
                partition: *partition,
                next_offset: *next_offset,
            })
            .collect();
        if !offsets.is_empty() {
            self.consumer.commit(&offsets)?;
        }

        // 循环线程自己停止，不需要唤醒
        self.shared.closed.store(true, Ordering::Release);
        self.shared.transition(LoopState::Running, LoopState::Stopping);
        info!(topic = %self.topic, limit = ?self.record_limit, committed = offsets.len(), "Record limit reached, stopping consumer loop");
        Ok(())
    }

    fn release(&mut self) {
        if let Err(err) = self.consumer.close() {
            warn!(topic = %self.topic, error = %err, "Failed to close consumer");
        }
    }
}

fn track_position(positions: &mut BTreeMap<(String, i32), i64>, record: &ConsumerRecord) {
    let next = CommitOffset::after(record);
    positions.insert((next.topic, next.partition), next.next_offset);
}

impl<C, H> ConsumerLoop<C, H>
where
    C: PollingConsumer + 'static,
    H: RecordHandler + 'static,
{
    /// 在独立线程上启动循环
    pub fn spawn(self) -> Result<ConsumerLoopHandle> {
        let shutdown = self.shutdown_handle();
        let topic = self.topic.clone();
        let join = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || self.run())?;

        debug!(topic = %topic, "Consumer loop thread spawned");
        Ok(ConsumerLoopHandle {
            shutdown,
            join: Some(join),
        })
    }

    /// 在阻塞线程上运行循环，直到收到关闭信号
    ///
    /// 信号发送端被丢弃也视为关闭信号。返回的 future 在信号到达前被丢弃时，
    /// 循环同样被关闭，后台线程随后释放消费者。
    pub async fn run_until(self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        let guard = ShutdownOnDrop(self.shutdown_handle());
        let mut worker = tokio::task::spawn_blocking(move || self.run());

        tokio::select! {
            joined = &mut worker => return joined?,
            _ = shutdown_rx => {
                info!("Shutdown signal received, stopping consumer loop");
            }
        }

        guard.0.shutdown();
        worker.await?
    }
}

/// 已启动循环的句柄
///
/// 丢弃句柄不会停止循环，线程继续运行直到有人调用 `shutdown`。
pub struct ConsumerLoopHandle {
    shutdown: ShutdownHandle,
    join: Option<JoinHandle<Result<()>>>,
}

impl ConsumerLoopHandle {
    /// 请求关闭
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> LoopState {
        self.shutdown.state()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    /// 等待线程结束并返回循环的结果
    pub fn join(mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| ClientError::internal("consumer loop thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConsumerLoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerLoopHandle")
            .field("state", &self.state())
            .field("finished", &self.is_finished())
            .finish()
    }
}
