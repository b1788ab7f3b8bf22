//! 好友关系Repository接口定义

use crate::entities::Friend;
use crate::errors::RepositoryResult;
use crate::value_objects::UserId;
use async_trait::async_trait;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait FriendRepository: Send + Sync {
    /// 建立好友关系，关系已存在时返回 `Conflict`
    async fn create(&self, friend: Friend) -> RepositoryResult<Friend>;

    /// 查找好友关系，与参数顺序无关
    async fn find(&self, a: UserId, b: UserId) -> RepositoryResult<Option<Friend>>;

    /// 删除好友关系，不存在时返回 `NotFound`
    async fn delete(&self, a: UserId, b: UserId) -> RepositoryResult<Friend>;

    /// 列出用户参与的全部好友关系
    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Friend>>;
}
