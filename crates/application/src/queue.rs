//! 持久队列管道
//!
//! 生产端把消息追加到可重放的日志，等待 broker 确认；
//! 消费端是一个常驻循环，逐条读取已提交的消息并驱动扇出。
//! 记录在扇出全部发出之后才确认，进程在此之前退出会重新读到它。
//! 读取或解码失败只记录日志，循环继续。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::ChatMessage;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dead_letter::{DeadLetter, DeadLetterSink};
use crate::dispatcher::DeliveryDispatcher;

/// 读取失败后的最长退避时间
const MAX_READ_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("queue closed")]
    Closed,
}

/// 队列中的一条记录，`partition`/`offset` 用于确认
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEvent {
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

/// broker 确认写入的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    pub partition: i32,
    pub offset: i64,
}

pub fn encode_message(message: &ChatMessage) -> Result<Vec<u8>, QueueError> {
    serde_json::to_vec(message).map_err(|err| QueueError::Serialization(err.to_string()))
}

pub fn decode_message(payload: &[u8]) -> Result<ChatMessage, QueueError> {
    serde_json::from_slice(payload).map_err(|err| QueueError::Serialization(err.to_string()))
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// 追加消息并等待 broker 确认
    async fn produce(&self, message: &ChatMessage) -> Result<Delivered, QueueError>;
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// 阻塞读取下一条已提交的记录，队列关闭时返回 `QueueError::Closed`
    async fn next_event(&self) -> Result<QueueEvent, QueueError>;

    /// 确认记录已处理，重启后从它之后开始读取
    async fn commit(&self, event: &QueueEvent) -> Result<(), QueueError>;
}

/// 每个进程一个逻辑消费者
pub struct ConsumerLoop {
    source: Arc<dyn MessageSource>,
    dispatcher: Arc<DeliveryDispatcher>,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl ConsumerLoop {
    pub fn new(
        source: Arc<dyn MessageSource>,
        dispatcher: Arc<DeliveryDispatcher>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            source,
            dispatcher,
            dead_letters,
        }
    }

    /// 运行直到 `shutdown` 被触发或队列关闭
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("消费循环已启动");
        let mut consecutive_errors = 0u32;

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.source.next_event() => next,
            };

            match next {
                Ok(event) => {
                    consecutive_errors = 0;
                    self.handle_event(&event).await;
                    if let Err(err) = self.source.commit(&event).await {
                        tracing::warn!(
                            partition = event.partition,
                            offset = event.offset,
                            error = %err,
                            "确认消费位置失败"
                        );
                    }
                }
                Err(QueueError::Closed) => {
                    tracing::info!("队列已关闭");
                    break;
                }
                Err(err) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let delay = read_backoff(consecutive_errors);
                    tracing::error!(
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "读取队列失败"
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("消费循环已停止");
    }

    async fn handle_event(&self, event: &QueueEvent) {
        let message = match decode_message(&event.payload) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(
                    partition = event.partition,
                    offset = event.offset,
                    error = %err,
                    "反序列化消息失败"
                );
                self.dead_letters.record(DeadLetter::Undecodable {
                    reason: err.to_string(),
                });
                return;
            }
        };

        tracing::debug!(
            message_id = %message.id,
            partition = event.partition,
            offset = event.offset,
            "接收到消息"
        );
        // 已发出的推送在后台完成
        self.dispatcher.push_chat_message(&message).await;
    }
}

fn read_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(10);
    Duration::from_millis(100u64 << exp).min(MAX_READ_BACKOFF)
}
