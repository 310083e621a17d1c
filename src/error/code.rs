//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 配置相关错误
/// - 2000-2999: Broker（被包装的客户端库）相关错误
/// - 3000-3999: 生命周期相关错误（超时、唤醒、取消）
/// - 6000-6999: 系统相关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 配置相关错误 (1000-1999)
    // ============================================================
    ConfigurationError = 1000,
    InvalidOption = 1001,
    UnsupportedCodec = 1002,
    ConfigLoadFailed = 1003,

    // ============================================================
    // Broker 相关错误 (2000-2999)
    // ============================================================
    BrokerError = 2000,
    BrokerUnavailable = 2001,
    TopicNotFound = 2002,
    TopicAlreadyExists = 2003,
    MessageSendFailed = 2004,
    PollFailed = 2005,
    NotSubscribed = 2006,
    ClientClosed = 2007,
    AdminCommandFailed = 2008,
    MessageDecodeFailed = 2009,

    // ============================================================
    // 生命周期相关错误 (3000-3999)
    // ============================================================
    ReadTimeout = 3000,
    Interrupted = 3001,
    Cancelled = 3002,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    InternalError = 6000,
    IoError = 6001,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::InvalidOption => "INVALID_OPTION",
            ErrorCode::UnsupportedCodec => "UNSUPPORTED_CODEC",
            ErrorCode::ConfigLoadFailed => "CONFIG_LOAD_FAILED",
            ErrorCode::BrokerError => "BROKER_ERROR",
            ErrorCode::BrokerUnavailable => "BROKER_UNAVAILABLE",
            ErrorCode::TopicNotFound => "TOPIC_NOT_FOUND",
            ErrorCode::TopicAlreadyExists => "TOPIC_ALREADY_EXISTS",
            ErrorCode::MessageSendFailed => "MESSAGE_SEND_FAILED",
            ErrorCode::PollFailed => "POLL_FAILED",
            ErrorCode::NotSubscribed => "NOT_SUBSCRIBED",
            ErrorCode::ClientClosed => "CLIENT_CLOSED",
            ErrorCode::AdminCommandFailed => "ADMIN_COMMAND_FAILED",
            ErrorCode::MessageDecodeFailed => "MESSAGE_DECODE_FAILED",
            ErrorCode::ReadTimeout => "READ_TIMEOUT",
            ErrorCode::Interrupted => "INTERRUPTED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::IoError => "IO_ERROR",
        }
    }

    /// 获取错误代码的类别（用于错误分类）
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Configuration,
            2000..=2999 => ErrorCategory::Broker,
            3000..=3999 => ErrorCategory::Lifecycle,
            _ => ErrorCategory::System,
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Configuration,
    Broker,
    Lifecycle,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "CONFIGURATION"),
            ErrorCategory::Broker => write!(f, "BROKER"),
            ErrorCategory::Lifecycle => write!(f, "LIFECYCLE"),
            ErrorCategory::System => write!(f, "SYSTEM"),
        }
    }
}
