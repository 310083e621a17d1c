//! 门面
//!
//! `KafkaUtils` 绑定一代默认配置、一个客户端工厂和一个主题管理后端，
//! 提供"用默认配置创建客户端、发一批消息、读 N 条消息、管理主题"这些常用操作。

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::kafka::admin::{run_topic_command, AdminTarget, TopicAdmin, TopicCommand};
use crate::kafka::client::ClientFactory;
use crate::kafka::client_config::{keys, resolve, ClientConfiguration};
use crate::kafka::defaults::{Defaults, Generation};
use crate::kafka::producer::send_all;
use crate::runtime::config::LoopConfig;
use crate::runtime::consumer_loop::{ConsumerLoop, ConsumerLoopHandle};
use crate::runtime::handler::RecordHandler;
use crate::runtime::read::read_expected;

/// 绑定某一代默认配置的 Kafka 工具集
pub struct KafkaUtils<F: ClientFactory> {
    generation: Generation,
    factory: F,
    admin: Arc<dyn TopicAdmin>,
    topic: String,
    admin_target: AdminTarget,
    producer_overrides: ClientConfiguration,
    consumer_overrides: ClientConfiguration,
    loop_config: LoopConfig,
}

impl<F: ClientFactory> KafkaUtils<F> {
    pub fn new(generation: Generation, factory: F, admin: Arc<dyn TopicAdmin>) -> Self {
        let defaults = generation.defaults();
        Self {
            generation,
            factory,
            admin,
            topic: defaults.topic().to_string(),
            admin_target: default_target(generation),
            producer_overrides: ClientConfiguration::new(),
            consumer_overrides: ClientConfiguration::new(),
            loop_config: LoopConfig::default(),
        }
    }

    /// 0.8 客户端 API
    pub fn legacy(factory: F, admin: Arc<dyn TopicAdmin>) -> Self {
        Self::new(Generation::Legacy, factory, admin)
    }

    /// 0.9 客户端 API
    pub fn modern(factory: F, admin: Arc<dyn TopicAdmin>) -> Self {
        Self::new(Generation::Modern, factory, admin)
    }

    /// 替换默认主题
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// 替换主题管理命令的默认目标
    pub fn with_admin_target(mut self, target: AdminTarget) -> Self {
        self.admin_target = target;
        self
    }

    /// 每次创建生产者时叠加在默认值上的选项
    pub fn with_producer_overrides(mut self, overrides: ClientConfiguration) -> Self {
        self.producer_overrides = overrides;
        self
    }

    /// 每次创建消费者时叠加在默认值上的选项
    pub fn with_consumer_overrides(mut self, overrides: ClientConfiguration) -> Self {
        self.consumer_overrides = overrides;
        self
    }

    pub fn with_loop_config(mut self, config: LoopConfig) -> Self {
        self.loop_config = config;
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn defaults(&self) -> &'static Defaults {
        self.generation.defaults()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn admin_target(&self) -> &AdminTarget {
        &self.admin_target
    }

    pub fn loop_config(&self) -> &LoopConfig {
        &self.loop_config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// 默认值叠加基础覆盖项后的生产者配置
    pub fn producer_config(&self) -> ClientConfiguration {
        self.defaults().resolve_producer(&self.producer_overrides)
    }

    /// 默认值叠加基础覆盖项后的消费者配置
    pub fn consumer_config(&self) -> ClientConfiguration {
        self.defaults().resolve_consumer(&self.consumer_overrides)
    }

    // -------- 生产者 --------

    /// 用默认配置创建生产者
    pub fn create_producer(&self) -> Result<F::Producer> {
        self.create_producer_from(&self.producer_config())
    }

    /// 默认配置叠加 `overrides` 后创建生产者
    pub fn create_producer_with(&self, overrides: &ClientConfiguration) -> Result<F::Producer> {
        self.create_producer_from(&resolve(&self.producer_config(), overrides))
    }

    /// 用完整配置创建生产者
    pub fn create_producer_from(&self, config: &ClientConfiguration) -> Result<F::Producer> {
        debug!(generation = %self.generation, config = %config, "Creating producer");
        self.factory.create_producer(config)
    }

    /// 把消息发送到默认主题，返回发送条数
    pub fn send_messages<I, V>(&self, messages: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.send_messages_to(&self.topic, messages)
    }

    pub fn send_messages_to<I, V>(&self, topic: &str, messages: I) -> Result<usize>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        send_all(self.create_producer()?, topic, messages)
    }

    // -------- 消费者 --------

    pub fn create_consumer(&self) -> Result<F::Consumer> {
        self.create_consumer_from(&self.consumer_config())
    }

    pub fn create_consumer_with(&self, overrides: &ClientConfiguration) -> Result<F::Consumer> {
        self.create_consumer_from(&resolve(&self.consumer_config(), overrides))
    }

    pub fn create_consumer_from(&self, config: &ClientConfiguration) -> Result<F::Consumer> {
        debug!(generation = %self.generation, config = %config, "Creating consumer");
        self.factory.create_consumer(config)
    }

    /// 在后台线程上持续消费默认主题，记录只写日志
    pub fn read_messages(&self) -> Result<ConsumerLoopHandle> {
        self.read_messages_from(&self.topic)
    }

    pub fn read_messages_from(&self, topic: &str) -> Result<ConsumerLoopHandle> {
        ConsumerLoop::new(self.create_consumer()?, topic)
            .with_config(self.loop_config.clone())
            .spawn()
    }

    /// 在后台线程上持续消费，每条记录交给 `handler`
    pub fn read_messages_with<H>(&self, topic: &str, handler: H) -> Result<ConsumerLoopHandle>
    where
        H: RecordHandler + 'static,
    {
        ConsumerLoop::new(self.create_consumer()?, topic)
            .with_config(self.loop_config.clone())
            .with_handler(handler)
            .spawn()
    }

    /// 从默认主题读取 `expected` 条消息
    pub async fn read_expected(&self, expected: usize) -> Result<Vec<String>> {
        self.read_expected_with_cancel(&self.topic, expected, CancellationToken::new())
            .await
    }

    pub async fn read_expected_from(&self, topic: &str, expected: usize) -> Result<Vec<String>> {
        self.read_expected_with_cancel(topic, expected, CancellationToken::new())
            .await
    }

    pub async fn read_expected_with_cancel(
        &self,
        topic: &str,
        expected: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<String>> {
        // 位置由读取循环在交付够条数后显式提交
        let overrides = ClientConfiguration::new().with(keys::ENABLE_AUTO_COMMIT, "false");
        let consumer = self.create_consumer_with(&overrides)?;
        read_expected(consumer, topic, expected, &self.loop_config, cancel).await
    }

    // -------- 主题管理 --------

    pub async fn list_topics(&self) -> Result<Vec<String>> {
        self.list_topics_at(&self.admin_target).await
    }

    pub async fn list_topics_at(&self, target: &AdminTarget) -> Result<Vec<String>> {
        self.run(TopicCommand::list(target.clone())).await
    }

    /// 创建主题（1 副本、1 分区）
    pub async fn create_topic(&self, topic: &str) -> Result<()> {
        self.create_topic_at(&self.admin_target, topic).await
    }

    pub async fn create_topic_at(&self, target: &AdminTarget, topic: &str) -> Result<()> {
        self.run(TopicCommand::create(target.clone(), topic)).await.map(|_| ())
    }

    pub async fn delete_topic(&self, topic: &str) -> Result<()> {
        self.delete_topic_at(&self.admin_target, topic).await
    }

    pub async fn delete_topic_at(&self, target: &AdminTarget, topic: &str) -> Result<()> {
        self.run(TopicCommand::delete(target.clone(), topic)).await.map(|_| ())
    }

    /// 执行任意主题命令
    pub async fn run(&self, command: TopicCommand) -> Result<Vec<String>> {
        run_topic_command(self.admin.as_ref(), &command).await
    }
}

impl<F: ClientFactory> fmt::Debug for KafkaUtils<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaUtils")
            .field("generation", &self.generation)
            .field("topic", &self.topic)
            .field("admin_target", &self.admin_target)
            .field("loop_config", &self.loop_config)
            .finish()
    }
}

/// 每一代默认的主题管理目标
///
/// 0.8 通过 zookeeper，0.9 直接连接 broker。
pub fn default_target(generation: Generation) -> AdminTarget {
    let defaults = generation.defaults();
    match generation {
        Generation::Legacy => AdminTarget::Zookeeper(defaults.zookeeper_server().to_string()),
        Generation::Modern => AdminTarget::Bootstrap(defaults.kafka_server().to_string()),
    }
}
