//! Kafka 消息队列模块
//!
//! 提供按房间分区的 Kafka 生产者和消费者实现。

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::KafkaMessageConsumer;
pub use error::{KafkaError, KafkaResult};
pub use producer::KafkaMessageProducer;
