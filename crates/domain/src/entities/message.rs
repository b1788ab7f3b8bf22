//! 聊天消息实体
//!
//! 消息创建后不可变：持久化一次、投递若干次、永久保留。

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{MessageId, RoomId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 文本消息长度上限（字符）
pub const MAX_TEXT_CHARS: usize = 4096;

/// 按种类区分的消息载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// 文本消息
    Text { text: String },
    /// 图片消息，只携带元数据，图片本体走文件服务
    Image {
        height: u32,
        width: u32,
        size: u64,
        filename: String,
    },
    /// 其它类型原样透传
    Other { payload: serde_json::Value },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    fn validate(&self) -> DomainResult<()> {
        match self {
            Self::Text { text } => {
                if text.trim().is_empty() {
                    return Err(DomainError::invalid_argument("content", "cannot be empty"));
                }
                if text.chars().count() > MAX_TEXT_CHARS {
                    return Err(DomainError::invalid_argument("content", "too long"));
                }
            }
            Self::Image { filename, .. } => {
                if filename.is_empty() {
                    return Err(DomainError::invalid_argument("filename", "cannot be empty"));
                }
            }
            Self::Other { .. } => {}
        }
        Ok(())
    }
}

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub from: UserId,
    /// 目标房间：私聊房间或群组房间
    pub to: RoomId,
    pub content: MessageContent,
    #[serde(rename = "type")]
    pub message_type: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        from: UserId,
        to: RoomId,
        content: MessageContent,
        message_type: impl Into<String>,
        timestamp: Timestamp,
    ) -> DomainResult<Self> {
        if from.is_nil() {
            return Err(DomainError::invalid_argument("from", "cannot be empty"));
        }
        if to.is_nil() {
            return Err(DomainError::invalid_argument("to", "cannot be empty"));
        }
        content.validate()?;

        Ok(Self {
            id,
            from,
            to,
            content,
            message_type: message_type.into(),
            timestamp,
        })
    }
}

/// 推送给网关的信封，每个接收者一份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushChatRequest {
    pub message: ChatMessage,
    pub target: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(content: MessageContent) -> DomainResult<ChatMessage> {
        ChatMessage::new(
            MessageId::generate(),
            UserId::generate(),
            RoomId::generate(),
            content,
            "text",
            Utc::now(),
        )
    }

    #[test]
    fn rejects_nil_sender() {
        let result = ChatMessage::new(
            MessageId::generate(),
            UserId::new(uuid::Uuid::nil()),
            RoomId::generate(),
            MessageContent::text("hi"),
            "text",
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(DomainError::InvalidArgument { ref field, .. }) if field == "from"
        ));
    }

    #[test]
    fn rejects_blank_text() {
        assert!(sample(MessageContent::text("   ")).is_err());
    }

    #[test]
    fn content_is_kind_tagged() {
        let message = sample(MessageContent::Image {
            height: 480,
            width: 640,
            size: 2048,
            filename: "cat.png".into(),
        })
        .unwrap();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["content"]["kind"], "image");
        assert_eq!(json["content"]["width"], 640);
        assert_eq!(json["type"], "text");
    }
}
