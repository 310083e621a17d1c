//! 文件配置
//!
//! ```toml
//! generation = "legacy"
//! topic = "orders"
//!
//! [producer]
//! "compression.type" = "snappy"
//!
//! [consumer]
//! "auto.offset.reset" = "earliest"
//!
//! [runtime]
//! poll_timeout_ms = 100
//! read_timeout_ms = 30000
//!
//! [admin]
//! script = "/opt/kafka/bin/kafka-topics.sh"
//! target = { type = "zookeeper", address = "localhost:2181" }
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ErrorCode, Result};
use crate::kafka::admin::{AdminTarget, ScriptTopicAdmin, TopicAdmin, DEFAULT_TOPICS_SCRIPT};
use crate::kafka::client::ClientFactory;
use crate::kafka::client_config::ClientConfiguration;
use crate::kafka::defaults::Generation;
use crate::kafka::utils::{default_target, KafkaUtils};
use crate::runtime::config::{LoopConfig, DEFAULT_THREAD_NAME};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UtilsConfig {
    #[serde(default)]
    pub generation: Generation,
    /// 默认主题，缺省使用该代的默认值
    pub topic: Option<String>,
    #[serde(default)]
    pub producer: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub consumer: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub admin: AdminSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 客户端选项值，TOML 里可以写成字符串、整数、浮点数或布尔值
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(v) => write!(f, "{}", v),
            OptionValue::Integer(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::Flag(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_poll_timeout_ms() -> u64 {
    100
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminSection {
    /// `kafka-topics.sh` 路径
    pub script: Option<PathBuf>,
    /// 管理命令目标，缺省时 0.8 用 zookeeper、0.9 用 broker
    pub target: Option<AdminTarget>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl UtilsConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ClientError::Configuration {
            code: ErrorCode::ConfigLoadFailed,
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: UtilsConfig = toml::from_str(content)?;
        if config.runtime.poll_timeout_ms == 0 {
            return Err(ClientError::Configuration {
                code: ErrorCode::InvalidOption,
                reason: "runtime.poll_timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(config)
    }

    pub fn topic(&self) -> &str {
        self.topic
            .as_deref()
            .unwrap_or_else(|| self.generation.defaults().topic())
    }

    /// 文件中的生产者覆盖项
    pub fn producer_overrides(&self) -> ClientConfiguration {
        to_configuration(&self.producer)
    }

    /// 文件中的消费者覆盖项
    pub fn consumer_overrides(&self) -> ClientConfiguration {
        to_configuration(&self.consumer)
    }

    /// 默认值叠加文件覆盖项后的生产者配置
    pub fn producer_config(&self) -> ClientConfiguration {
        self.generation.defaults().resolve_producer(&self.producer_overrides())
    }

    /// 默认值叠加文件覆盖项后的消费者配置
    pub fn consumer_config(&self) -> ClientConfiguration {
        self.generation.defaults().resolve_consumer(&self.consumer_overrides())
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig::default()
            .with_poll_timeout(Duration::from_millis(self.runtime.poll_timeout_ms))
            .with_read_timeout(Duration::from_millis(self.runtime.read_timeout_ms))
            .with_thread_name(self.runtime.thread_name.clone())
    }

    pub fn admin_target(&self) -> AdminTarget {
        self.admin
            .target
            .clone()
            .unwrap_or_else(|| default_target(self.generation))
    }

    /// 基于脚本的主题管理后端
    pub fn script_admin(&self) -> ScriptTopicAdmin {
        match &self.admin.script {
            Some(script) => ScriptTopicAdmin::new(script),
            None => ScriptTopicAdmin::new(DEFAULT_TOPICS_SCRIPT),
        }
    }

    /// 按文件配置构建门面
    pub fn build_utils<F: ClientFactory>(&self, factory: F, admin: Arc<dyn TopicAdmin>) -> KafkaUtils<F> {
        KafkaUtils::new(self.generation, factory, admin)
            .with_topic(self.topic())
            .with_admin_target(self.admin_target())
            .with_producer_overrides(self.producer_overrides())
            .with_consumer_overrides(self.consumer_overrides())
            .with_loop_config(self.loop_config())
    }
}

fn to_configuration(table: &BTreeMap<String, OptionValue>) -> ClientConfiguration {
    table.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
}
