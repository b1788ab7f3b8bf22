//! Kafka 消息消费者
//!
//! 作为消费者组成员逐条读取已提交的记录，交给 `ConsumerLoop` 处理。
//! 位置只在 `commit` 之后才会被自动提交，未处理完的记录在重启后会重新读到。

use application::{MessageSource, QueueError, QueueEvent};
use async_trait::async_trait;
use config::KafkaConfig;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::info;

use crate::kafka::{KafkaError, KafkaResult};

pub struct KafkaMessageConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaMessageConsumer {
    /// 创建消费者并订阅主题
    pub fn new(config: &KafkaConfig) -> KafkaResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("group.id", &config.group_id)
            .set("bootstrap.servers", config.brokers.join(","))
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "10000")
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.commit.interval.ms", "1000")
            // 新的消费者组从最早的记录开始
            .set("auto.offset.reset", "earliest");

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| KafkaError::ConfigError {
                    message: format!("创建 Kafka 消费者失败: {}", e),
                })?;

        consumer
            .subscribe(&[&config.topic])
            .map_err(|e| KafkaError::ConsumerError {
                message: format!("订阅主题失败: {}", e),
            })?;

        info!(group_id = %config.group_id, topic = %config.topic, "Kafka 消费者已订阅");

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaMessageConsumer {
    async fn next_event(&self) -> Result<QueueEvent, QueueError> {
        let message = self.consumer.recv().await.map_err(KafkaError::from)?;
        Ok(QueueEvent {
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    async fn commit(&self, event: &QueueEvent) -> Result<(), QueueError> {
        self.consumer
            .store_offset(&self.topic, event.partition, event.offset)
            .map_err(|e| QueueError::Commit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::KafkaMessageProducer;
    use application::{decode_message, MessageProducer};
    use chrono::Utc;
    use domain::{ChatMessage, MessageContent, MessageId, RoomId, UserId};
    use std::time::Duration;

    #[tokio::test]
    #[ignore = "requires a running Kafka broker on localhost:9092"]
    async fn produced_message_round_trips_through_kafka() {
        let config = KafkaConfig {
            enabled: true,
            brokers: vec!["localhost:9092".to_string()],
            topic: format!("round-trip-{}", uuid::Uuid::new_v4()),
            group_id: format!("round-trip-{}", uuid::Uuid::new_v4()),
            send_timeout_ms: 5000,
            acks: "all".to_string(),
        };
        let producer = KafkaMessageProducer::new(&config).unwrap();
        let consumer = KafkaMessageConsumer::new(&config).unwrap();

        let original = ChatMessage::new(
            MessageId::generate(),
            UserId::generate(),
            RoomId::generate(),
            MessageContent::text("over the wire"),
            "text",
            Utc::now(),
        )
        .unwrap();
        producer.produce(&original).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(30), consumer.next_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_message(&event.payload).unwrap(), original);
        consumer.commit(&event).await.unwrap();
    }
}
