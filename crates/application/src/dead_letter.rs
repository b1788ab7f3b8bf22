//! 后台任务失败记录
//!
//! 聊天请求在持久化和投递确认之前就已经返回成功，
//! 之后发生的失败统一交给 `DeadLetterSink`，不会被静默丢弃。

use domain::{MessageId, RoomId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub enum DeadLetter {
    /// 写入消息存储失败
    Persist { message_id: MessageId, reason: String },
    /// 写入持久队列失败
    Enqueue { message_id: MessageId, reason: String },
    /// 接收者集合解析失败，整条消息没有投递
    Unresolved {
        message_id: MessageId,
        room_id: RoomId,
        reason: String,
    },
    /// 单个接收者推送失败
    Delivery {
        message_id: MessageId,
        target: UserId,
        reason: String,
    },
    /// 队列中的数据无法解码
    Undecodable { reason: String },
}

impl DeadLetter {
    pub fn kind(&self) -> &'static str {
        match self {
            DeadLetter::Persist { .. } => "persist",
            DeadLetter::Enqueue { .. } => "enqueue",
            DeadLetter::Unresolved { .. } => "unresolved",
            DeadLetter::Delivery { .. } => "delivery",
            DeadLetter::Undecodable { .. } => "undecodable",
        }
    }
}

pub trait DeadLetterSink: Send + Sync {
    fn record(&self, letter: DeadLetter);
}

/// 只写日志的实现
#[derive(Debug, Default, Clone)]
pub struct LoggingDeadLetterSink;

impl DeadLetterSink for LoggingDeadLetterSink {
    fn record(&self, letter: DeadLetter) {
        tracing::warn!(kind = letter.kind(), letter = ?letter, "后台任务失败");
    }
}
