//! 房间Repository接口定义

use crate::entities::Room;
use crate::errors::RepositoryResult;
use crate::value_objects::RoomId;
use async_trait::async_trait;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: Room) -> RepositoryResult<Room>;

    async fn find_by_id(&self, room_id: RoomId) -> RepositoryResult<Option<Room>>;

    async fn delete(&self, room_id: RoomId) -> RepositoryResult<()>;
}
