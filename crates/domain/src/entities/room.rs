//! 房间实体
//!
//! 房间是消息的投递容器：要么是两人私聊，要么是群组背后的会话。

use serde::{Deserialize, Serialize};

use crate::value_objects::{GroupId, RoomId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub one_to_one: bool,
    pub members: Vec<UserId>,
}

impl Room {
    pub fn direct(room_id: RoomId, a: UserId, b: UserId) -> Self {
        Self {
            room_id,
            one_to_one: true,
            members: vec![a, b],
        }
    }

    /// 群组房间不单独维护成员，成员以群组存储为准
    pub fn for_group(group_id: GroupId) -> Self {
        Self {
            room_id: RoomId::from(group_id),
            one_to_one: false,
            members: Vec::new(),
        }
    }

    /// 除 `uid` 以外的成员
    pub fn members_except(&self, uid: UserId) -> Vec<UserId> {
        self.members.iter().copied().filter(|m| *m != uid).collect()
    }
}
