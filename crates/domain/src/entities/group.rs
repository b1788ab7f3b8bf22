//! 群组实体

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{GroupId, RoomId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    pub admin: UserId,
    pub created_at: Timestamp,
}

impl Group {
    pub fn new(
        group_id: GroupId,
        name: impl Into<String>,
        admin: UserId,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DomainError::invalid_argument("group_name", "cannot be empty"));
        }
        if name.chars().count() > 64 {
            return Err(DomainError::invalid_argument("group_name", "too long"));
        }
        if admin.is_nil() {
            return Err(DomainError::invalid_argument("group_admin", "cannot be nil"));
        }
        Ok(Self {
            group_id,
            name,
            admin,
            created_at,
        })
    }

    /// 群组的消息房间
    pub fn room_id(&self) -> RoomId {
        RoomId::from(self.group_id)
    }
}

/// 群组及其成员列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<UserId>,
}

/// 群组成员关系
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub uid: UserId,
    pub joined_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn group_room_shares_id() {
        let group = Group::new(GroupId::generate(), " rustaceans ", UserId::generate(), Utc::now())
            .unwrap();
        assert_eq!(group.name, "rustaceans");
        assert_eq!(group.room_id().0, group.group_id.0);
    }

    #[test]
    fn blank_group_name_rejected() {
        let result = Group::new(GroupId::generate(), "", UserId::generate(), Utc::now());
        assert!(result.is_err());
    }
}
