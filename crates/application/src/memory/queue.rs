use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use domain::ChatMessage;
use tokio::sync::{mpsc, Mutex};

use crate::queue::{encode_message, Delivered, MessageProducer, MessageSource, QueueError, QueueEvent};

/// 尚未确认任何记录
const NOTHING_COMMITTED: i64 = -1;

/// 单分区的进程内队列
pub struct InMemoryQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<QueueEvent>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<QueueEvent>>,
    next_offset: AtomicI64,
    committed: AtomicI64,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(receiver),
            next_offset: AtomicI64::new(0),
            committed: AtomicI64::new(NOTHING_COMMITTED),
        }
    }

    /// 最后确认的位置
    pub fn committed(&self) -> Option<i64> {
        match self.committed.load(Ordering::SeqCst) {
            NOTHING_COMMITTED => None,
            offset => Some(offset),
        }
    }

    /// 直接写入原始字节，不经过序列化
    pub fn push_raw(&self, payload: Vec<u8>) -> Option<Delivered> {
        let sender = self.sender.try_lock().ok()?.clone()?;
        self.append(&sender, payload).ok()
    }

    /// 关闭写入端；已写入的记录读完后消费者收到 `QueueError::Closed`
    pub async fn close(&self) {
        self.sender.lock().await.take();
    }

    fn append(
        &self,
        sender: &mpsc::UnboundedSender<QueueEvent>,
        payload: Vec<u8>,
    ) -> Result<Delivered, QueueError> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        sender
            .send(QueueEvent {
                payload,
                partition: 0,
                offset,
            })
            .map_err(|_| QueueError::Closed)?;
        Ok(Delivered { partition: 0, offset })
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageProducer for InMemoryQueue {
    async fn produce(&self, message: &ChatMessage) -> Result<Delivered, QueueError> {
        let payload = encode_message(message)?;
        let sender = self.sender.lock().await.clone().ok_or(QueueError::Closed)?;
        let delivered = self.append(&sender, payload)?;
        tracing::debug!(message_id = %message.id, offset = delivered.offset, "消息已入队");
        Ok(delivered)
    }
}

#[async_trait]
impl MessageSource for InMemoryQueue {
    async fn next_event(&self) -> Result<QueueEvent, QueueError> {
        self.receiver.lock().await.recv().await.ok_or(QueueError::Closed)
    }

    async fn commit(&self, event: &QueueEvent) -> Result<(), QueueError> {
        self.committed.fetch_max(event.offset, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_queue_drains_then_reports_closed() {
        let queue = InMemoryQueue::new();
        queue.push_raw(b"a".to_vec()).unwrap();
        queue.push_raw(b"b".to_vec()).unwrap();
        queue.close().await;

        assert_eq!(queue.next_event().await.unwrap().offset, 0);
        assert_eq!(queue.next_event().await.unwrap().offset, 1);
        assert_eq!(queue.next_event().await, Err(QueueError::Closed));
        assert!(queue.push_raw(b"c".to_vec()).is_none());
    }

    #[tokio::test]
    async fn commit_never_moves_backwards() {
        let queue = InMemoryQueue::new();
        queue.push_raw(b"a".to_vec()).unwrap();
        queue.push_raw(b"b".to_vec()).unwrap();
        assert_eq!(queue.committed(), None);

        let first = queue.next_event().await.unwrap();
        let second = queue.next_event().await.unwrap();
        queue.commit(&second).await.unwrap();
        queue.commit(&first).await.unwrap();
        assert_eq!(queue.committed(), Some(1));
    }
}
