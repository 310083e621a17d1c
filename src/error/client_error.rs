//! Kafka 工具统一错误类型

use super::code::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Kafka 工具统一错误类型
///
/// 除 `Timeout` / `Interrupted` / `Cancelled` 外，其余错误都是被包装客户端库
/// 原样抛出的失败，本层不做解释和重试。
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// 配置错误（非法选项、不支持的编解码器、配置文件问题）
    #[error("配置错误 [{code}] {reason}")]
    Configuration { code: ErrorCode, reason: String },

    /// Broker 客户端错误
    #[error("Broker 错误 [{code}] {message}")]
    Broker { code: ErrorCode, message: String },

    /// 在截止时间内没有收到足够的消息
    #[error("等待消息超时: 期望 {expected} 条, 实际收到 {received} 条 (耗时 {elapsed:?})")]
    Timeout {
        expected: usize,
        received: usize,
        elapsed: Duration,
    },

    /// 轮询在运行中被唤醒
    #[error("轮询被唤醒中断")]
    Interrupted,

    /// 操作被取消令牌取消
    #[error("操作已取消")]
    Cancelled,

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),

    /// 内部错误（线程崩溃等）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ClientError {
    /// 创建配置错误
    pub fn configuration(reason: impl Into<String>) -> Self {
        ClientError::Configuration {
            code: ErrorCode::ConfigurationError,
            reason: reason.into(),
        }
    }

    /// 创建不支持编解码器的错误
    pub fn unsupported_codec(key: &str, value: &str) -> Self {
        ClientError::Configuration {
            code: ErrorCode::UnsupportedCodec,
            reason: format!("unsupported codec `{}` for `{}`", value, key),
        }
    }

    /// 创建 Broker 错误
    pub fn broker(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError::Broker {
            code,
            message: message.into(),
        }
    }

    /// 创建主题不存在错误
    pub fn topic_not_found(topic: &str) -> Self {
        Self::broker(ErrorCode::TopicNotFound, format!("topic `{}` does not exist", topic))
    }

    /// 创建客户端已关闭错误
    pub fn client_closed(what: &str) -> Self {
        Self::broker(ErrorCode::ClientClosed, format!("{} already closed", what))
    }

    /// 创建内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        ClientError::Internal(msg.into())
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Configuration { code, .. } => *code,
            ClientError::Broker { code, .. } => *code,
            ClientError::Timeout { .. } => ErrorCode::ReadTimeout,
            ClientError::Interrupted => ErrorCode::Interrupted,
            ClientError::Cancelled => ErrorCode::Cancelled,
            ClientError::Io(_) => ErrorCode::IoError,
            ClientError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 是否为读取超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// 是否来自被包装的客户端库
    pub fn is_broker(&self) -> bool {
        matches!(self, ClientError::Broker { .. })
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ClientError>;
