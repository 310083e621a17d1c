//! 进程内 broker 集成测试
//!
//! 覆盖门面的完整流程：发送、读取、超时、取消、关闭和主题管理。

use std::sync::Arc;
use std::time::{Duration, Instant};

use kafka_utils::kafka::client_config::keys;
use kafka_utils::memory::InMemoryBroker;
use kafka_utils::runtime::LoopConfig;
use kafka_utils::{ClientConfiguration, ClientError, ErrorCode, KafkaUtils, LoopState, UtilsConfig};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn fast_loop() -> LoopConfig {
    LoopConfig::default()
        .with_poll_timeout(Duration::from_millis(20))
        .with_read_timeout(Duration::from_secs(5))
}

fn legacy_utils() -> (InMemoryBroker, KafkaUtils<InMemoryBroker>) {
    let broker = InMemoryBroker::new();
    let utils = KafkaUtils::legacy(broker.clone(), Arc::new(broker.clone())).with_loop_config(fast_loop());
    (broker, utils)
}

#[tokio::test]
async fn send_then_read_returns_messages_in_order() {
    let (broker, utils) = legacy_utils();

    let sent = assert_ok!(utils.send_messages(["Message A", "Message B", "Message C"]));
    assert_eq!(sent, 3);

    let read = assert_ok!(utils.read_expected(3).await);
    assert_eq!(read, ["Message A", "Message B", "Message C"]);

    let stats = broker.stats();
    assert_eq!(stats.producers_closed, 1);
    assert_eq!(stats.consumers_closed, 1);
}

#[tokio::test]
async fn partial_read_leaves_remaining_messages_for_next_read() {
    let (broker, utils) = legacy_utils();

    utils.send_messages(["Message A", "Message B", "Message C", "Message D"]).unwrap();

    let first = assert_ok!(utils.read_expected(3).await);
    assert_eq!(first, ["Message A", "Message B", "Message C"]);
    assert_eq!(broker.committed_offset("KafkaUtilsGroup", "TestTopic").unwrap(), Some(3));

    let second = assert_ok!(utils.read_expected(1).await);
    assert_eq!(second, ["Message D"]);
    assert_eq!(broker.committed_offset("KafkaUtilsGroup", "TestTopic").unwrap(), Some(4));
    assert_eq!(broker.stats().consumers_closed, 2);
}

#[tokio::test]
async fn modern_generation_reads_from_start_with_override() {
    let broker = InMemoryBroker::new();
    let utils = KafkaUtils::modern(broker.clone(), Arc::new(broker.clone()))
        .with_loop_config(fast_loop())
        .with_consumer_overrides(ClientConfiguration::new().with(keys::AUTO_OFFSET_RESET, "earliest"));

    utils.send_messages_to("metrics", ["1", "2"]).unwrap();
    let read = utils.read_expected_from("metrics", 2).await.unwrap();
    assert_eq!(read, ["1", "2"]);
}

#[tokio::test]
async fn short_topic_times_out_and_releases_consumer_once() {
    let broker = InMemoryBroker::new();
    let utils = KafkaUtils::legacy(broker.clone(), Arc::new(broker.clone()))
        .with_loop_config(fast_loop().with_read_timeout(Duration::from_millis(300)));

    utils.send_messages(["only", "two"]).unwrap();

    let err = assert_err!(utils.read_expected(3).await);
    assert_eq!(err.code(), ErrorCode::ReadTimeout);
    match err {
        ClientError::Timeout { expected, received, .. } => {
            assert_eq!(expected, 3);
            assert_eq!(received, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(broker.stats().consumers_closed, 1);
}

#[tokio::test]
async fn cancellation_stops_read() {
    let (broker, utils) = legacy_utils();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = utils
        .read_expected_with_cancel("quiet", 5, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(broker.stats().consumers_closed, 1);
}

#[tokio::test]
async fn shutdown_wakes_long_poll() {
    let broker = InMemoryBroker::new();
    let utils = KafkaUtils::legacy(broker.clone(), Arc::new(broker.clone()))
        .with_loop_config(LoopConfig::default().with_poll_timeout(Duration::from_secs(60)));

    let handle = utils.read_messages_from("idle").unwrap();

    // 等循环进入 Running
    for _ in 0..200 {
        if handle.state() == LoopState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(handle.state(), LoopState::Running);

    let started = Instant::now();
    handle.shutdown();
    handle.shutdown();
    let joined = tokio::task::spawn_blocking(move || handle.join()).await.unwrap();

    assert_ok!(joined);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(broker.stats().consumers_closed, 1);
}

#[tokio::test]
async fn topic_administration_round() {
    let (broker, utils) = legacy_utils();

    assert_ok!(utils.create_topic("alpha").await);
    assert_ok!(utils.create_topic("beta").await);
    assert_eq!(utils.list_topics().await.unwrap(), ["alpha", "beta"]);

    let dup = utils.create_topic("alpha").await.unwrap_err();
    assert_eq!(dup.code(), ErrorCode::TopicAlreadyExists);

    assert_ok!(utils.delete_topic("alpha").await);
    assert_eq!(utils.list_topics().await.unwrap(), ["beta"]);
    assert_eq!(broker.topic_layout("beta").unwrap(), Some((1, 1)));
}

#[tokio::test]
async fn file_configuration_drives_the_facade() {
    let config = UtilsConfig::from_toml_str(
        r#"
generation = "legacy"
topic = "configured"

[consumer]
"group.id" = "file-group"

[runtime]
poll_timeout_ms = 20
read_timeout_ms = 5000
"#,
    )
    .unwrap();

    let broker = InMemoryBroker::new();
    let utils = config.build_utils(broker.clone(), Arc::new(broker.clone()));
    assert_eq!(utils.topic(), "configured");
    assert_eq!(utils.consumer_config().get(keys::GROUP_ID), Some("file-group"));

    utils.send_messages(["from-file"]).unwrap();
    assert_eq!(utils.read_expected(1).await.unwrap(), ["from-file"]);
    assert_eq!(broker.committed_offset("file-group", "configured").unwrap(), Some(1));
}

#[tokio::test]
async fn unsupported_serializer_fails_before_sending() {
    let (broker, utils) = legacy_utils();
    let overrides = ClientConfiguration::new().with(keys::SERIALIZER_CLASS, "kafka.serializer.DefaultEncoder");

    let err = utils.create_producer_with(&overrides).map(|_| ()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedCodec);
    assert_eq!(broker.stats().producers_created, 0);
}
