//! 记录处理器

use tracing::info;

use crate::kafka::record::ConsumerRecord;

/// 记录处理器 trait
///
/// 轮询循环对每条取回的记录调用一次 `handle`。处理器没有超时保护，
/// 慢处理器会拖住整个循环。
pub trait RecordHandler: Send {
    fn handle(&mut self, record: &ConsumerRecord);
}

impl<F> RecordHandler for F
where
    F: FnMut(&ConsumerRecord) + Send,
{
    fn handle(&mut self, record: &ConsumerRecord) {
        self(record)
    }
}

/// 默认处理器：记录 offset / key / value
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecordHandler;

impl RecordHandler for LogRecordHandler {
    fn handle(&mut self, record: &ConsumerRecord) {
        info!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            key = ?record.key,
            value = %record.value,
            "offset = {}, key = {}, value = {}",
            record.offset,
            record.key.as_deref().unwrap_or("null"),
            record.value
        );
    }
}
