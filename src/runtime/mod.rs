//! 消费运行时
//!
//! 提供后台轮询循环和建立在其上的有界读取
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use kafka_utils::memory::InMemoryBroker;
//! use kafka_utils::kafka::{ClientFactory, Generation};
//! use kafka_utils::runtime::ConsumerLoop;
//!
//! # fn main() -> kafka_utils::Result<()> {
//! let broker = InMemoryBroker::new();
//! let config = Generation::Modern.defaults().consumer_config();
//! let consumer = broker.create_consumer(&config)?;
//!
//! let handle = ConsumerLoop::new(consumer, "TestTopic").spawn()?;
//! // ... 其他线程可以随时调用 shutdown
//! handle.shutdown();
//! handle.join()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer_loop;
pub mod handler;
pub mod read;

pub use config::LoopConfig;
pub use consumer_loop::{ConsumerLoop, ConsumerLoopHandle, LoopState, ShutdownHandle};
pub use handler::{LogRecordHandler, RecordHandler};
pub use read::read_expected;
