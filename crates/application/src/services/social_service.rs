use std::sync::Arc;

use domain::{
    DomainError, Friend, FriendData, FriendRepository, Group, GroupData, GroupId, GroupMember,
    GroupRepository, RepositoryError, Room, RoomId, RoomRepository, User, UserId, UserRepository,
};

use crate::{clock::Clock, error::ApplicationError, views::group_datas};

pub struct SocialServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub friend_repository: Arc<dyn FriendRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub room_repository: Arc<dyn RoomRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 好友、群组关系的维护和检索
pub struct SocialService {
    deps: SocialServiceDependencies,
}

fn search_pattern(pattern: &str) -> Result<&str, ApplicationError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(DomainError::invalid_argument("pattern", "cannot be empty").into());
    }
    Ok(pattern)
}

impl SocialService {
    pub fn new(deps: SocialServiceDependencies) -> Self {
        Self { deps }
    }

    async fn require_user(&self, uid: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(uid)
            .await?
            .ok_or(ApplicationError::Domain(DomainError::UserNotFound))
    }

    async fn require_group(&self, group_id: GroupId) -> Result<Group, ApplicationError> {
        self.deps
            .group_repository
            .find_by_id(group_id)
            .await?
            .ok_or(ApplicationError::Domain(DomainError::GroupNotFound))
    }

    async fn group_data(&self, group_id: GroupId) -> Result<GroupData, ApplicationError> {
        let group = self.require_group(group_id).await?;
        let mut datas = group_datas(vec![group], self.deps.group_repository.as_ref()).await?;
        datas
            .pop()
            .ok_or(ApplicationError::Domain(DomainError::GroupNotFound))
    }

    /// 建立好友关系，同时创建两人的私聊房间；返回 `friend_a` 视角的好友数据
    pub async fn add_friend(
        &self,
        friend_a: UserId,
        friend_b: UserId,
    ) -> Result<FriendData, ApplicationError> {
        if friend_a == friend_b {
            return Err(DomainError::invalid_argument("friend_b", "cannot befriend yourself").into());
        }
        self.require_user(friend_a).await?;
        let other = self.require_user(friend_b).await?;

        if self
            .deps
            .friend_repository
            .find(friend_a, friend_b)
            .await?
            .is_some()
        {
            return Err(DomainError::FriendshipExists.into());
        }

        let room = self
            .deps
            .room_repository
            .create(Room::direct(RoomId::generate(), friend_a, friend_b))
            .await?;
        let edge = Friend::new(friend_a, friend_b, room.room_id, self.deps.clock.now())?;

        let edge = match self.deps.friend_repository.create(edge).await {
            Ok(edge) => edge,
            Err(err) => {
                // 好友边写入失败时撤销刚建的房间
                if let Err(cleanup) = self.deps.room_repository.delete(room.room_id).await {
                    tracing::warn!(room_id = %room.room_id, error = %cleanup, "回滚私聊房间失败");
                }
                return Err(match err {
                    RepositoryError::Conflict => DomainError::FriendshipExists.into(),
                    other => other.into(),
                });
            }
        };

        tracing::info!(friend_a = %friend_a, friend_b = %friend_b, room_id = %edge.room_id, "好友关系已建立");
        Ok(FriendData::from_edge(&edge, &other))
    }

    pub async fn delete_friend(
        &self,
        friend_a: UserId,
        friend_b: UserId,
    ) -> Result<Friend, ApplicationError> {
        let edge = match self.deps.friend_repository.delete(friend_a, friend_b).await {
            Ok(edge) => edge,
            Err(RepositoryError::NotFound) => return Err(DomainError::FriendshipNotFound.into()),
            Err(err) => return Err(err.into()),
        };

        match self.deps.room_repository.delete(edge.room_id).await {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(err) => {
                tracing::warn!(room_id = %edge.room_id, error = %err, "删除私聊房间失败");
            }
        }

        tracing::info!(friend_a = %friend_a, friend_b = %friend_b, "好友关系已解除");
        Ok(edge)
    }

    /// 创建群组及其消息房间，创建者自动入群
    pub async fn create_group(
        &self,
        name: &str,
        admin: UserId,
    ) -> Result<GroupData, ApplicationError> {
        self.require_user(admin).await?;
        let group = Group::new(GroupId::generate(), name, admin, self.deps.clock.now())?;

        // 先建房间：群组一旦可见，发往它的消息就必须能解析
        let room = self
            .deps
            .room_repository
            .create(Room::for_group(group.group_id))
            .await?;
        let group = match self.deps.group_repository.create(group).await {
            Ok(group) => group,
            Err(err) => {
                if let Err(cleanup) = self.deps.room_repository.delete(room.room_id).await {
                    tracing::warn!(room_id = %room.room_id, error = %cleanup, "回滚群组房间失败");
                }
                return Err(err.into());
            }
        };

        tracing::info!(group_id = %group.group_id, admin = %admin, "群组已创建");
        self.group_data(group.group_id).await
    }

    pub async fn join_group(
        &self,
        group_id: GroupId,
        uid: UserId,
    ) -> Result<GroupData, ApplicationError> {
        self.require_group(group_id).await?;
        self.require_user(uid).await?;

        let member = GroupMember {
            group_id,
            uid,
            joined_at: self.deps.clock.now(),
        };
        match self.deps.group_repository.add_member(member).await {
            Ok(_) => {}
            Err(RepositoryError::Conflict) => return Err(DomainError::AlreadyGroupMember.into()),
            Err(RepositoryError::NotFound) => return Err(DomainError::GroupNotFound.into()),
            Err(err) => return Err(err.into()),
        }

        self.group_data(group_id).await
    }

    pub async fn leave_group(
        &self,
        group_id: GroupId,
        uid: UserId,
    ) -> Result<GroupData, ApplicationError> {
        self.require_group(group_id).await?;

        match self.deps.group_repository.remove_member(group_id, uid).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(DomainError::NotGroupMember.into()),
            Err(err) => return Err(err.into()),
        }

        self.group_data(group_id).await
    }

    /// 把好友拉进群；已经在群里的直接跳过。
    /// 任一被邀请者不存在时整个邀请失败，不会有人被加入
    pub async fn invite_friends(
        &self,
        group_id: GroupId,
        friends: &[UserId],
    ) -> Result<GroupData, ApplicationError> {
        self.require_group(group_id).await?;

        let mut invitees = friends.to_vec();
        invitees.sort();
        invitees.dedup();
        let found = self.deps.user_repository.find_by_ids(&invitees).await?;
        if let Some(missing) = invitees
            .iter()
            .find(|uid| !found.iter().any(|user| user.uid == **uid))
        {
            tracing::warn!(group_id = %group_id, uid = %missing, "被邀请的用户不存在");
            return Err(DomainError::UserNotFound.into());
        }

        let now = self.deps.clock.now();
        let members = invitees
            .into_iter()
            .map(|uid| GroupMember {
                group_id,
                uid,
                joined_at: now,
            })
            .collect();
        match self.deps.group_repository.add_members(group_id, members).await {
            Ok(added) => {
                tracing::info!(group_id = %group_id, added, "好友已加入群组");
            }
            Err(RepositoryError::NotFound) => return Err(DomainError::GroupNotFound.into()),
            Err(err) => {
                tracing::error!(group_id = %group_id, error = %err, "邀请入群失败");
                return Err(err.into());
            }
        }

        self.group_data(group_id).await
    }

    pub async fn find_user(&self, pattern: &str) -> Result<Vec<User>, ApplicationError> {
        let pattern = search_pattern(pattern)?;
        Ok(self.deps.user_repository.search_by_account(pattern).await?)
    }

    pub async fn find_group(&self, pattern: &str) -> Result<Vec<Group>, ApplicationError> {
        let pattern = search_pattern(pattern)?;
        Ok(self.deps.group_repository.search_by_name(pattern).await?)
    }
}
