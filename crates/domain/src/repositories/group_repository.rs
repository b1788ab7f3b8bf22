//! 群组Repository接口定义

use crate::entities::{Group, GroupMember};
use crate::errors::RepositoryResult;
use crate::value_objects::{GroupId, UserId};
use async_trait::async_trait;

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// 创建群组并把管理员加入成员列表
    async fn create(&self, group: Group) -> RepositoryResult<Group>;

    async fn find_by_id(&self, group_id: GroupId) -> RepositoryResult<Option<Group>>;

    /// 按群名子串模糊查找
    async fn search_by_name(&self, pattern: &str) -> RepositoryResult<Vec<Group>>;

    /// 添加成员，已是成员时返回 `Conflict`
    async fn add_member(&self, member: GroupMember) -> RepositoryResult<GroupMember>;

    /// 批量添加成员，要么全部写入要么都不写入；已是成员的跳过。
    /// 返回实际新增的数量
    async fn add_members(&self, group_id: GroupId, members: Vec<GroupMember>)
        -> RepositoryResult<usize>;

    /// 移除成员，不是成员时返回 `NotFound`
    async fn remove_member(&self, group_id: GroupId, uid: UserId) -> RepositoryResult<()>;

    async fn list_members(&self, group_id: GroupId) -> RepositoryResult<Vec<UserId>>;

    /// 用户加入的全部群组
    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Group>>;
}
