//! 主题管理
//!
//! 主题的列出/创建/删除都表示为一次性的 `TopicCommand`，可以渲染成
//! `kafka-topics.sh` 的参数列表，由 `TopicAdmin` 后端执行。

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorCode, Result};

/// 默认副本数
pub const DEFAULT_REPLICATION_FACTOR: u16 = 1;
/// 默认分区数
pub const DEFAULT_PARTITIONS: u32 = 1;
/// 默认的主题管理脚本
pub const DEFAULT_TOPICS_SCRIPT: &str = "kafka-topics.sh";

/// 管理命令的连接目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "address", rename_all = "lowercase")]
pub enum AdminTarget {
    /// 通过 zookeeper 管理（旧版集群）
    Zookeeper(String),
    /// 直接连接 broker
    Bootstrap(String),
}

impl AdminTarget {
    pub fn address(&self) -> &str {
        match self {
            AdminTarget::Zookeeper(addr) | AdminTarget::Bootstrap(addr) => addr,
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            AdminTarget::Zookeeper(_) => "--zookeeper",
            AdminTarget::Bootstrap(_) => "--bootstrap-server",
        }
    }
}

/// 主题操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicAction {
    List,
    Create {
        topic: String,
        replication_factor: u16,
        partitions: u32,
    },
    Delete {
        topic: String,
    },
}

/// 一次性主题管理命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCommand {
    pub target: AdminTarget,
    pub action: TopicAction,
}

impl TopicCommand {
    /// 列出主题
    pub fn list(target: AdminTarget) -> Self {
        Self {
            target,
            action: TopicAction::List,
        }
    }

    /// 创建主题（副本数和分区数默认都为 1）
    pub fn create(target: AdminTarget, topic: impl Into<String>) -> Self {
        Self {
            target,
            action: TopicAction::Create {
                topic: topic.into(),
                replication_factor: DEFAULT_REPLICATION_FACTOR,
                partitions: DEFAULT_PARTITIONS,
            },
        }
    }

    /// 删除主题
    pub fn delete(target: AdminTarget, topic: impl Into<String>) -> Self {
        Self {
            target,
            action: TopicAction::Delete {
                topic: topic.into(),
            },
        }
    }

    /// 设置副本数（仅对创建命令生效）
    #[must_use]
    pub fn with_replication_factor(mut self, factor: u16) -> Self {
        if let TopicAction::Create {
            replication_factor, ..
        } = &mut self.action
        {
            *replication_factor = factor;
        }
        self
    }

    /// 设置分区数（仅对创建命令生效）
    #[must_use]
    pub fn with_partitions(mut self, count: u32) -> Self {
        if let TopicAction::Create { partitions, .. } = &mut self.action {
            *partitions = count;
        }
        self
    }

    /// 操作名称，用于日志
    pub fn operation_name(&self) -> &'static str {
        match self.action {
            TopicAction::List => "ListTopics",
            TopicAction::Create { .. } => "CreateTopic",
            TopicAction::Delete { .. } => "DeleteTopic",
        }
    }

    /// 操作涉及的主题
    pub fn topic(&self) -> Option<&str> {
        match &self.action {
            TopicAction::List => None,
            TopicAction::Create { topic, .. } | TopicAction::Delete { topic } => Some(topic),
        }
    }

    /// 渲染为 `kafka-topics.sh` 参数列表
    pub fn arguments(&self) -> Vec<String> {
        let target = [self.target.flag().to_string(), self.target.address().to_string()];
        match &self.action {
            TopicAction::List => {
                let mut args = vec!["--list".to_string()];
                args.extend(target);
                args
            }
            TopicAction::Create {
                topic,
                replication_factor,
                partitions,
            } => {
                let mut args = vec!["--create".to_string()];
                args.extend(target);
                args.extend([
                    "--replication-factor".to_string(),
                    replication_factor.to_string(),
                    "--partitions".to_string(),
                    partitions.to_string(),
                    "--topic".to_string(),
                    topic.clone(),
                ]);
                args
            }
            TopicAction::Delete { topic } => {
                let mut args = vec!["--delete".to_string()];
                args.extend(target);
                args.extend(["--topic".to_string(), topic.clone()]);
                args
            }
        }
    }
}

impl fmt::Display for TopicCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.operation_name(), self.arguments().join(", "))
    }
}

/// 主题管理后端
///
/// 返回值：列出命令返回全部主题名，创建/删除命令返回被操作的主题名。
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn execute(&self, command: &TopicCommand) -> Result<Vec<String>>;
}

/// 执行命令并记录日志
pub async fn run_topic_command(admin: &dyn TopicAdmin, command: &TopicCommand) -> Result<Vec<String>> {
    info!("Executing: {}", command);
    admin.execute(command).await
}

/// 通过 `kafka-topics.sh` 执行主题命令
#[derive(Debug, Clone)]
pub struct ScriptTopicAdmin {
    script: PathBuf,
}

impl ScriptTopicAdmin {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &std::path::Path {
        &self.script
    }
}

impl Default for ScriptTopicAdmin {
    fn default() -> Self {
        Self::new(DEFAULT_TOPICS_SCRIPT)
    }
}

#[async_trait]
impl TopicAdmin for ScriptTopicAdmin {
    async fn execute(&self, command: &TopicCommand) -> Result<Vec<String>> {
        let output = tokio::process::Command::new(&self.script)
            .args(command.arguments())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            warn!(
                script = %self.script.display(),
                status = %output.status,
                stderr = %stderr.trim(),
                "Topic command failed"
            );
            return Err(ClientError::broker(
                ErrorCode::AdminCommandFailed,
                format!("{} exited with {}: {}", command.operation_name(), output.status, stderr.trim()),
            ));
        }

        debug!(stdout = %stdout.trim(), "Topic command finished");

        Ok(match command.topic() {
            Some(topic) => vec![topic.to_string()],
            None => stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

// -------- rdkafka admin --------

/// 基于 rdkafka `AdminClient` 的主题管理后端
///
/// 只支持 `AdminTarget::Bootstrap`，zookeeper 目标会返回配置错误。
#[cfg(feature = "kafka")]
pub struct RdKafkaTopicAdmin {
    operation_timeout: std::time::Duration,
}

#[cfg(feature = "kafka")]
impl RdKafkaTopicAdmin {
    pub fn new(operation_timeout: std::time::Duration) -> Self {
        Self { operation_timeout }
    }

    fn client(
        &self,
        target: &AdminTarget,
    ) -> Result<rdkafka::admin::AdminClient<rdkafka::client::DefaultClientContext>> {
        match target {
            AdminTarget::Bootstrap(address) => Ok(rdkafka::config::ClientConfig::new()
                .set("bootstrap.servers", address)
                .create()?),
            AdminTarget::Zookeeper(address) => Err(ClientError::configuration(format!(
                "native admin client cannot reach zookeeper `{}`, use a bootstrap target",
                address
            ))),
        }
    }
}

#[cfg(feature = "kafka")]
impl Default for RdKafkaTopicAdmin {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(30))
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl TopicAdmin for RdKafkaTopicAdmin {
    async fn execute(&self, command: &TopicCommand) -> Result<Vec<String>> {
        use rdkafka::admin::{AdminOptions, NewTopic, TopicReplication};

        let admin = self.client(&command.target)?;
        let options = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        match &command.action {
            TopicAction::List => {
                let timeout = self.operation_timeout;
                let names = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
                    let metadata = admin.inner().fetch_metadata(None, timeout)?;
                    let mut names: Vec<String> =
                        metadata.topics().iter().map(|t| t.name().to_string()).collect();
                    names.sort();
                    Ok(names)
                })
                .await??;
                Ok(names)
            }
            TopicAction::Create {
                topic,
                replication_factor,
                partitions,
            } => {
                let new_topic = NewTopic::new(
                    topic,
                    native_partition_count(*partitions)?,
                    TopicReplication::Fixed(i32::from(*replication_factor)),
                );
                let results = admin.create_topics(&[new_topic], &options).await?;
                collect_admin_results(results)
            }
            TopicAction::Delete { topic } => {
                let results = admin.delete_topics(&[topic.as_str()], &options).await?;
                collect_admin_results(results)
            }
        }
    }
}

/// 原生管理接口使用 i32 分区数
#[cfg_attr(not(feature = "kafka"), allow(dead_code))]
pub(crate) fn native_partition_count(partitions: u32) -> Result<i32> {
    i32::try_from(partitions).map_err(|_| ClientError::Configuration {
        code: ErrorCode::InvalidOption,
        reason: format!("partition count {} exceeds {}", partitions, i32::MAX),
    })
}

#[cfg(feature = "kafka")]
fn collect_admin_results(results: Vec<rdkafka::admin::TopicResult>) -> Result<Vec<String>> {
    use rdkafka::types::RDKafkaErrorCode;

    results
        .into_iter()
        .map(|result| {
            result.map_err(|(topic, code)| {
                let local = match code {
                    RDKafkaErrorCode::TopicAlreadyExists => ErrorCode::TopicAlreadyExists,
                    RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic => {
                        ErrorCode::TopicNotFound
                    }
                    _ => ErrorCode::AdminCommandFailed,
                };
                ClientError::broker(local, format!("topic `{}`: {}", topic, code))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_count_beyond_i32_is_rejected() {
        assert_eq!(native_partition_count(12).unwrap(), 12);
        assert_eq!(native_partition_count(i32::MAX as u32).unwrap(), i32::MAX);

        let err = native_partition_count(u32::MAX).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOption);
    }

    fn zk() -> AdminTarget {
        AdminTarget::Zookeeper("localhost:2181".to_string())
    }

    #[test]
    fn list_arguments() {
        assert_eq!(
            TopicCommand::list(zk()).arguments(),
            ["--list", "--zookeeper", "localhost:2181"]
        );
    }

    #[test]
    fn create_arguments_use_single_replica_and_partition() {
        let cmd = TopicCommand::create(zk(), "TestTopic");
        assert_eq!(
            cmd.arguments(),
            [
                "--create",
                "--zookeeper",
                "localhost:2181",
                "--replication-factor",
                "1",
                "--partitions",
                "1",
                "--topic",
                "TestTopic"
            ]
        );
        assert_eq!(cmd.operation_name(), "CreateTopic");
    }

    #[test]
    fn create_arguments_honor_overrides() {
        let cmd = TopicCommand::create(AdminTarget::Bootstrap("b:9092".into()), "orders")
            .with_replication_factor(3)
            .with_partitions(12);
        let args = cmd.arguments();
        assert_eq!(&args[..3], ["--create", "--bootstrap-server", "b:9092"]);
        assert_eq!(&args[3..7], ["--replication-factor", "3", "--partitions", "12"]);
    }

    #[test]
    fn delete_arguments() {
        let cmd = TopicCommand::delete(zk(), "TestTopic");
        assert_eq!(
            cmd.arguments(),
            ["--delete", "--zookeeper", "localhost:2181", "--topic", "TestTopic"]
        );
        assert_eq!(cmd.topic(), Some("TestTopic"));
    }

    #[test]
    fn partitions_ignored_for_non_create() {
        let cmd = TopicCommand::delete(zk(), "t").with_partitions(4);
        assert_eq!(cmd.action, TopicAction::Delete { topic: "t".into() });
    }

    #[test]
    fn display_contains_operation_and_args() {
        let text = TopicCommand::list(zk()).to_string();
        assert_eq!(text, "ListTopics [--list, --zookeeper, localhost:2181]");
    }

    #[tokio::test]
    async fn missing_script_surfaces_io_error() {
        let admin = ScriptTopicAdmin::new("/nonexistent/kafka-topics.sh");
        let err = admin.execute(&TopicCommand::list(zk())).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IoError);
    }
}
