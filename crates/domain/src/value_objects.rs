use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

uuid_id!(
    /// 用户唯一标识。
    UserId
);
uuid_id!(
    /// 群组唯一标识。
    GroupId
);
uuid_id!(
    /// 房间唯一标识，也是聊天消息的投递目标。
    RoomId
);
uuid_id!(
    /// 消息唯一标识。
    MessageId
);

/// 群组的消息房间与群组共用同一个 UUID。
impl From<GroupId> for RoomId {
    fn from(value: GroupId) -> Self {
        Self(value.0)
    }
}

impl From<RoomId> for GroupId {
    fn from(value: RoomId) -> Self {
        Self(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_and_room_share_uuid() {
        let group_id = GroupId::generate();
        let room_id = RoomId::from(group_id);
        assert_eq!(room_id.0, group_id.0);
        assert_eq!(GroupId::from(room_id), group_id);
    }

    #[test]
    fn ids_serialize_as_plain_uuid() {
        let id = UserId::new(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
        assert!(id.is_nil());
    }
}
