//! Repository接口定义
//!
//! 内层定义接口，外层（内存实现、PostgreSQL 实现）实现接口。
//! 所有实现都必须用 `RepositoryError::NotFound` 报告“记录不存在”。

pub mod friend_repository;
pub mod group_repository;
pub mod message_repository;
pub mod room_repository;
pub mod user_repository;

pub use friend_repository::FriendRepository;
pub use group_repository::GroupRepository;
pub use message_repository::{MessageRepository, Page};
pub use room_repository::RoomRepository;
pub use user_repository::UserRepository;

#[cfg(feature = "testing")]
pub use friend_repository::MockFriendRepository;
#[cfg(feature = "testing")]
pub use group_repository::MockGroupRepository;
#[cfg(feature = "testing")]
pub use message_repository::MockMessageRepository;
#[cfg(feature = "testing")]
pub use room_repository::MockRoomRepository;
#[cfg(feature = "testing")]
pub use user_repository::MockUserRepository;
