//! 错误类型转换实现
//!
//! 提供各种错误类型之间的转换

use super::{ClientError, ErrorCode};
use std::io;

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::Configuration {
            code: ErrorCode::ConfigLoadFailed,
            reason: format!("TOML 解析错误: {}", err),
        }
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Internal(format!("blocking task failed: {}", err))
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for ClientError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        use rdkafka::error::KafkaError;
        use rdkafka::types::RDKafkaErrorCode;

        // 根据 rdkafka 错误映射到本地错误代码，消息保持原样
        let code = match &err {
            KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) => {
                return ClientError::Configuration {
                    code: ErrorCode::InvalidOption,
                    reason: err.to_string(),
                };
            }
            KafkaError::MessageProduction(_) => ErrorCode::MessageSendFailed,
            KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopicOrPartition)
            | KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopic) => {
                ErrorCode::TopicNotFound
            }
            KafkaError::MessageConsumption(_) => ErrorCode::PollFailed,
            KafkaError::AdminOp(_) | KafkaError::AdminOpCreation(_) => {
                ErrorCode::AdminCommandFailed
            }
            KafkaError::MetadataFetch(_) => ErrorCode::BrokerUnavailable,
            KafkaError::Subscription(_) => ErrorCode::NotSubscribed,
            _ => ErrorCode::BrokerError,
        };

        ClientError::Broker {
            code,
            message: err.to_string(),
        }
    }
}
