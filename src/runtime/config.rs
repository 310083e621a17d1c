//! 轮询循环配置模块

use std::time::Duration;

/// 默认有界等待时间
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// 默认读取截止时间
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// 默认线程名
pub const DEFAULT_THREAD_NAME: &str = "kafka-consumer";

/// 轮询循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 单次 poll 的有界等待时间（默认 100 毫秒）
    pub poll_timeout: Duration,
    /// "读取 N 条消息" 的截止时间（默认 30 秒）
    pub read_timeout: Duration,
    /// 后台线程名
    pub thread_name: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl LoopConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置有界等待时间
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// 设置读取截止时间
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 设置线程名
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
