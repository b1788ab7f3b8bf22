use std::sync::Arc;

use domain::{
    ChatMessage, DomainError, FriendRepository, GroupId, GroupRepository, MessageRepository, Page,
    RoomId, UserId,
};

use crate::error::ApplicationError;

/// 历史消息分页查询；`friend_id` 和 `group_id` 二选一，同时提供时以好友为准
#[derive(Debug, Clone)]
pub struct PullMessagesRequest {
    pub uid: UserId,
    pub friend_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub current: u32,
    pub page_size: u32,
}

pub struct HistoryServiceDependencies {
    pub friend_repository: Arc<dyn FriendRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
}

pub struct HistoryService {
    deps: HistoryServiceDependencies,
}

impl HistoryService {
    pub fn new(deps: HistoryServiceDependencies) -> Self {
        Self { deps }
    }

    /// 返回一页消息，最新的在前
    pub async fn pull_messages(
        &self,
        request: PullMessagesRequest,
    ) -> Result<Vec<ChatMessage>, ApplicationError> {
        let room_id = self.room_for(&request).await?;
        let page = Page::new(request.current, request.page_size);
        tracing::debug!(uid = %request.uid, room_id = %room_id, page = page.current, "拉取历史消息");
        Ok(self.deps.message_repository.list_by_room(room_id, page).await?)
    }

    async fn room_for(&self, request: &PullMessagesRequest) -> Result<RoomId, ApplicationError> {
        if let Some(friend_id) = request.friend_id {
            let edge = self
                .deps
                .friend_repository
                .find(request.uid, friend_id)
                .await?
                .ok_or(ApplicationError::Domain(DomainError::FriendshipNotFound))?;
            return Ok(edge.room_id);
        }

        if let Some(group_id) = request.group_id {
            let group = self
                .deps
                .group_repository
                .find_by_id(group_id)
                .await?
                .ok_or(ApplicationError::Domain(DomainError::GroupNotFound))?;
            let members = self.deps.group_repository.list_members(group_id).await?;
            if !members.contains(&request.uid) {
                return Err(DomainError::NotGroupMember.into());
            }
            return Ok(group.room_id());
        }

        Err(DomainError::invalid_argument("friend_id", "friend_id or group_id is required").into())
    }
}
