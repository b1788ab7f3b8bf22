//! 用户Repository接口定义

use crate::entities::User;
use crate::errors::RepositoryResult;
use crate::value_objects::UserId;
use async_trait::async_trait;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 创建新用户，账号冲突时返回 `Conflict`
    async fn create(&self, user: User) -> RepositoryResult<User>;

    /// 更新用户信息，用户不存在时返回 `NotFound`
    async fn update(&self, user: User) -> RepositoryResult<User>;

    async fn find_by_id(&self, uid: UserId) -> RepositoryResult<Option<User>>;

    /// 批量获取用户，缺失的 ID 直接忽略
    async fn find_by_ids(&self, uids: &[UserId]) -> RepositoryResult<Vec<User>>;

    /// 按账号子串模糊查找
    async fn search_by_account(&self, pattern: &str) -> RepositoryResult<Vec<User>>;
}
