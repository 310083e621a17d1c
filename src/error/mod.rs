//! Kafka 工具错误处理模块
//!
//! 提供统一的错误类型、错误代码分类和错误转换

pub mod client_error;
pub mod code;
pub mod conversions;

// 重新导出公共类型
pub use client_error::{ClientError, Result};
pub use code::{ErrorCategory, ErrorCode};
