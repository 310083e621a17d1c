//! 批量发送辅助函数

use tracing::{error, info};

use crate::error::Result;
use crate::kafka::client::MessageProducer;
use crate::kafka::record::ProducerRecord;

/// 把一组消息发送到 `topic`，然后关闭生产者
///
/// 每条消息作为不带键的记录发送，发送后立即记录日志，不等待投递确认。
/// 任何一条发送失败时仍然会关闭生产者，然后返回该发送错误。
///
/// # 返回
/// * `Result<usize>` - 成功发送的条数
pub fn send_all<P, I, V>(mut producer: P, topic: &str, messages: I) -> Result<usize>
where
    P: MessageProducer,
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    let mut sent = 0usize;
    let mut outcome = Ok(());

    for message in messages {
        let value: String = message.into();
        match producer.send(ProducerRecord::new(topic, value.clone())) {
            Ok(()) => {
                info!(topic = %topic, value = %value, "Published message {} to topic {}.", value, topic);
                sent += 1;
            }
            Err(err) => {
                error!(topic = %topic, error = %err, sent = sent, "Failed to publish message");
                outcome = Err(err);
                break;
            }
        }
    }

    let closed = producer.close();
    outcome?;
    closed?;
    Ok(sent)
}
