//! 消息Repository接口定义

use crate::entities::ChatMessage;
use crate::errors::RepositoryResult;
use crate::value_objects::RoomId;
use async_trait::async_trait;

/// 分页参数，`current` 从 1 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub current: u32,
    pub page_size: u32,
}

impl Page {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(current: u32, page_size: u32) -> Self {
        Self {
            current: current.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.current - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 保存消息，同一 ID 重复写入返回 `Conflict`
    async fn save(&self, message: ChatMessage) -> RepositoryResult<()>;

    /// 按时间倒序返回房间历史消息的一页
    async fn list_by_room(&self, room_id: RoomId, page: Page) -> RepositoryResult<Vec<ChatMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        let page = Page::new(0, 0);
        assert_eq!(page.current, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.offset(), 0);

        let page = Page::new(3, 500);
        assert_eq!(page.page_size, Page::MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 200);
    }
}
