//! Kafka 消息生产者
//!
//! 以目标房间 `to` 作为分区键，同一会话的消息落在同一分区，保持顺序。

use std::time::Duration;

use application::{encode_message, Delivered, MessageProducer, QueueError};
use async_trait::async_trait;
use config::KafkaConfig;
use domain::ChatMessage;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{error, info};

use crate::kafka::{KafkaError, KafkaResult};

pub struct KafkaMessageProducer {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaMessageProducer {
    pub fn new(config: &KafkaConfig) -> KafkaResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .set("acks", &config.acks);

        let producer: FutureProducer =
            client_config
                .create()
                .map_err(|e| KafkaError::ConfigError {
                    message: format!("创建 Kafka 生产者失败: {}", e),
                })?;

        info!(brokers = %config.brokers.join(","), topic = %config.topic, "Kafka 生产者创建成功");

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
        })
    }

    /// 刷新生产者缓冲区
    pub fn flush(&self) -> KafkaResult<()> {
        self.producer
            .flush(Timeout::After(Duration::from_secs(10)))
            .map_err(KafkaError::from)
    }
}

/// 分区键：同一房间的消息进入同一分区
pub(crate) fn partition_key(message: &ChatMessage) -> String {
    message.to.to_string()
}

#[async_trait]
impl MessageProducer for KafkaMessageProducer {
    async fn produce(&self, message: &ChatMessage) -> Result<Delivered, QueueError> {
        let payload = encode_message(message)?;
        let key = partition_key(message);
        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        match self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok(delivery) => {
                info!(
                    message_id = %message.id,
                    topic = %self.topic,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    "消息已投递到 Kafka"
                );
                Ok(Delivered {
                    partition: delivery.partition,
                    offset: delivery.offset,
                })
            }
            Err((kafka_err, _)) => {
                error!(message_id = %message.id, error = %kafka_err, "Kafka 投递失败");
                Err(KafkaError::ProducerError {
                    message: kafka_err.to_string(),
                }
                .into())
            }
        }
    }
}

impl Drop for KafkaMessageProducer {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            error!(error = %err, "关闭 Kafka 生产者时刷新失败");
        }
        info!("Kafka 生产者正在关闭");
    }
}
