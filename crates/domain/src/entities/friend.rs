//! 好友关系实体

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{RoomId, Timestamp, UserId};

use super::user::User;

/// 好友关系边，权威数据保存在好友存储中。
///
/// 每条好友关系对应一个一对一房间。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub friend_a: UserId,
    pub friend_b: UserId,
    pub room_id: RoomId,
    pub created_at: Timestamp,
}

impl Friend {
    pub fn new(
        friend_a: UserId,
        friend_b: UserId,
        room_id: RoomId,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        if friend_a == friend_b {
            return Err(DomainError::invalid_argument("friend_b", "cannot befriend yourself"));
        }
        Ok(Self {
            friend_a,
            friend_b,
            room_id,
            created_at,
        })
    }

    pub fn involves(&self, uid: UserId) -> bool {
        self.friend_a == uid || self.friend_b == uid
    }

    /// 站在 `uid` 的角度看，另一方是谁
    pub fn other(&self, uid: UserId) -> Option<UserId> {
        if self.friend_a == uid {
            Some(self.friend_b)
        } else if self.friend_b == uid {
            Some(self.friend_a)
        } else {
            None
        }
    }
}

/// 好友关系与对方公开资料的反范式视图，仅供客户端展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendData {
    pub room_id: RoomId,
    pub uid: UserId,
    pub account: String,
    pub avatar: String,
    pub created_at: Timestamp,
}

impl FriendData {
    pub fn from_edge(edge: &Friend, friend: &User) -> Self {
        Self {
            room_id: edge.room_id,
            uid: friend.uid,
            account: friend.account.clone(),
            avatar: friend.avatar.clone(),
            created_at: edge.created_at,
        }
    }
}
