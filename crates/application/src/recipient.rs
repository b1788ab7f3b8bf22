//! 接收者解析
//!
//! 私聊房间：房间内除发送者以外的成员。
//! 群组房间：群组的全部成员，发送者本人也包含在内（用于多端同步）。

use std::sync::Arc;

use domain::{ChatMessage, GroupId, GroupRepository, RepositoryError, RoomId, RoomRepository, UserId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("group {0} not found")]
    GroupNotFound(GroupId),
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct RecipientResolver {
    rooms: Arc<dyn RoomRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl RecipientResolver {
    pub fn new(rooms: Arc<dyn RoomRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { rooms, groups }
    }

    /// 解析消息的接收者集合，接收者之间不保证顺序
    pub async fn resolve(&self, message: &ChatMessage) -> Result<Vec<UserId>, ResolveError> {
        let room = self
            .rooms
            .find_by_id(message.to)
            .await?
            .ok_or(ResolveError::RoomNotFound(message.to))?;

        if room.one_to_one {
            tracing::debug!(room_id = %room.room_id, "解析私聊接收者");
            return Ok(room.members_except(message.from));
        }

        let group_id = GroupId::from(room.room_id);
        match self.groups.list_members(group_id).await {
            Ok(members) => Ok(members),
            Err(RepositoryError::NotFound) => Err(ResolveError::GroupNotFound(group_id)),
            Err(err) => Err(err.into()),
        }
    }
}
