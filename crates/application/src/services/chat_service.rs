use std::sync::Arc;

use domain::{ChatMessage, MessageContent, MessageId, MessageRepository, RoomId, UserId};

use crate::{
    clock::Clock,
    dead_letter::{DeadLetter, DeadLetterSink},
    error::ApplicationError,
    queue::MessageProducer,
};

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub from: UserId,
    pub to: RoomId,
    pub content: MessageContent,
    pub message_type: String,
}

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub producer: Arc<dyn MessageProducer>,
    pub dead_letters: Arc<dyn DeadLetterSink>,
    pub clock: Arc<dyn Clock>,
}

/// 消息接收入口
///
/// 请求合法即返回成功；持久化和入队在后台进行，
/// 失败交给 `DeadLetterSink`，发送者看不到投递结果。
pub struct ChatService {
    deps: Arc<ChatServiceDependencies>,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ApplicationError> {
        let message = ChatMessage::new(
            MessageId::generate(),
            request.from,
            request.to,
            request.content,
            request.message_type,
            self.deps.clock.now(),
        )?;

        let deps = Arc::clone(&self.deps);
        let to_persist = message.clone();
        tokio::spawn(async move {
            let message_id = to_persist.id;
            if let Err(err) = deps.message_repository.save(to_persist).await {
                tracing::error!(message_id = %message_id, error = %err, "保存消息失败");
                deps.dead_letters.record(DeadLetter::Persist {
                    message_id,
                    reason: err.to_string(),
                });
            }
        });

        let deps = Arc::clone(&self.deps);
        let to_enqueue = message.clone();
        tokio::spawn(async move {
            match deps.producer.produce(&to_enqueue).await {
                Ok(delivered) => tracing::info!(
                    message_id = %to_enqueue.id,
                    partition = delivered.partition,
                    offset = delivered.offset,
                    "消息已写入队列"
                ),
                Err(err) => {
                    tracing::error!(message_id = %to_enqueue.id, error = %err, "消息入队失败");
                    deps.dead_letters.record(DeadLetter::Enqueue {
                        message_id: to_enqueue.id,
                        reason: err.to_string(),
                    });
                }
            }
        });

        Ok(message)
    }
}
