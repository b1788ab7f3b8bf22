//! 会话初始化数据加载（scatter-gather）
//!
//! 用户资料、好友列表、群组列表三路并发读取，各自返回带类型的结果，
//! 由协调者独占合并。整体受一个截止时间约束：超时或任意一路失败时，
//! 放弃其余任务并返回错误，绝不返回部分结果。

use std::sync::Arc;
use std::time::Duration;

use domain::{
    FriendData, FriendRepository, GroupData, GroupRepository, RepositoryError, User, UserId,
    UserRepository,
};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::views::{friend_datas, group_datas};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
    #[error("load deadline of {0:?} exceeded")]
    Timeout(Duration),
    #[error("fetch task failed: {0}")]
    Task(String),
}

/// 客户端登录后的初始化数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionBootstrap {
    pub user: User,
    pub friends: Vec<FriendData>,
    pub groups: Vec<GroupData>,
}

enum Fetched {
    Profile(Option<User>),
    Friends(Vec<FriendData>),
    Groups(Vec<GroupData>),
}

type FetchSet = JoinSet<Result<Fetched, LoadError>>;

pub struct LoadService {
    users: Arc<dyn UserRepository>,
    friends: Arc<dyn FriendRepository>,
    groups: Arc<dyn GroupRepository>,
    timeout: Duration,
}

impl LoadService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        friends: Arc<dyn FriendRepository>,
        groups: Arc<dyn GroupRepository>,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            friends,
            groups,
            timeout,
        }
    }

    pub async fn load(&self, uid: UserId) -> Result<SessionBootstrap, LoadError> {
        let mut fetches: FetchSet = JoinSet::new();

        let users = Arc::clone(&self.users);
        fetches.spawn(async move { Ok(Fetched::Profile(users.find_by_id(uid).await?)) });

        let users = Arc::clone(&self.users);
        let friends = Arc::clone(&self.friends);
        fetches.spawn(async move {
            let edges = friends.list_by_user(uid).await?;
            Ok(Fetched::Friends(friend_datas(uid, edges, users.as_ref()).await?))
        });

        let groups = Arc::clone(&self.groups);
        fetches.spawn(async move {
            let joined = groups.list_by_user(uid).await?;
            Ok(Fetched::Groups(group_datas(joined, groups.as_ref()).await?))
        });

        let outcome = tokio::time::timeout(self.timeout, gather(uid, &mut fetches)).await;
        // 提前返回时取消仍在运行的读取
        fetches.abort_all();

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(LoadError::Timeout(self.timeout)),
        };
        if let Err(err) = &result {
            tracing::error!(uid = %uid, error = %err, "加载初始化数据失败");
        }
        result
    }
}

async fn gather(uid: UserId, fetches: &mut FetchSet) -> Result<SessionBootstrap, LoadError> {
    let mut user = None;
    let mut friends = None;
    let mut groups = None;

    while let Some(joined) = fetches.join_next().await {
        match joined.map_err(|err| LoadError::Task(err.to_string()))?? {
            Fetched::Profile(profile) => user = Some(profile.ok_or(LoadError::UserNotFound(uid))?),
            Fetched::Friends(list) => friends = Some(list),
            Fetched::Groups(list) => groups = Some(list),
        }
    }

    match (user, friends, groups) {
        (Some(user), Some(friends), Some(groups)) => Ok(SessionBootstrap {
            user,
            friends,
            groups,
        }),
        _ => Err(LoadError::Task("fetch finished without a result".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use domain::{
        Friend, Group, GroupId, GroupMember, MockFriendRepository, PasswordHash,
        RepositoryResult, RoomId,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 群组读取被人为拖慢的仓库
    struct SlowGroups {
        inner: Arc<InMemoryStore>,
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl GroupRepository for SlowGroups {
        async fn create(&self, group: Group) -> RepositoryResult<Group> {
            GroupRepository::create(self.inner.as_ref(), group).await
        }

        async fn find_by_id(&self, group_id: GroupId) -> RepositoryResult<Option<Group>> {
            GroupRepository::find_by_id(self.inner.as_ref(), group_id).await
        }

        async fn search_by_name(&self, pattern: &str) -> RepositoryResult<Vec<Group>> {
            self.inner.search_by_name(pattern).await
        }

        async fn add_member(&self, member: GroupMember) -> RepositoryResult<GroupMember> {
            self.inner.add_member(member).await
        }

        async fn add_members(
            &self,
            group_id: GroupId,
            members: Vec<GroupMember>,
        ) -> RepositoryResult<usize> {
            self.inner.add_members(group_id, members).await
        }

        async fn remove_member(&self, group_id: GroupId, uid: UserId) -> RepositoryResult<()> {
            self.inner.remove_member(group_id, uid).await
        }

        async fn list_members(&self, group_id: GroupId) -> RepositoryResult<Vec<UserId>> {
            self.inner.list_members(group_id).await
        }

        async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Group>> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            GroupRepository::list_by_user(self.inner.as_ref(), uid).await
        }
    }

    async fn add_user(store: &InMemoryStore, account: &str) -> User {
        let user = User::new(UserId::generate(), account, PasswordHash::default(), "").unwrap();
        UserRepository::create(store, user.clone()).await.unwrap()
    }

    /// 两个好友、一个群组
    async fn seeded() -> (Arc<InMemoryStore>, User) {
        let store = Arc::new(InMemoryStore::new());
        let me = add_user(&store, "me").await;
        for account in ["f1", "f2"] {
            let friend = add_user(&store, account).await;
            let edge = Friend::new(me.uid, friend.uid, RoomId::generate(), Utc::now()).unwrap();
            FriendRepository::create(store.as_ref(), edge).await.unwrap();
        }
        let group = Group::new(GroupId::generate(), "team", me.uid, Utc::now()).unwrap();
        GroupRepository::create(store.as_ref(), group).await.unwrap();
        (store, me)
    }

    #[tokio::test]
    async fn merges_all_three_fetches() {
        let (store, me) = seeded().await;
        let service = LoadService::new(
            store.clone(),
            store.clone(),
            store,
            Duration::from_secs(1),
        );

        let bootstrap = service.load(me.uid).await.unwrap();
        assert_eq!(bootstrap.user, me);
        assert_eq!(bootstrap.friends.len(), 2);
        assert_eq!(bootstrap.groups.len(), 1);
        assert_eq!(bootstrap.groups[0].members, vec![me.uid]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_group_fetch_fails_whole_load_and_is_cancelled() {
        let (store, me) = seeded().await;
        let finished = Arc::new(AtomicBool::new(false));
        let groups = Arc::new(SlowGroups {
            inner: store.clone(),
            delay: Duration::from_secs(5),
            finished: finished.clone(),
        });
        let service = LoadService::new(store.clone(), store, groups, Duration::from_secs(1));

        let result = service.load(me.uid).await;
        assert_eq!(result, Err(LoadError::Timeout(Duration::from_secs(1))));

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn any_store_failure_fails_whole_load() {
        let (store, me) = seeded().await;
        let mut friends = MockFriendRepository::new();
        friends
            .expect_list_by_user()
            .returning(|_| Err(RepositoryError::storage("connection reset")));
        let service = LoadService::new(
            store.clone(),
            Arc::new(friends),
            store,
            Duration::from_secs(1),
        );

        let result = service.load(me.uid).await;
        assert!(matches!(result, Err(LoadError::Store(RepositoryError::Storage { .. }))));
    }

    #[tokio::test]
    async fn missing_profile_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        let ghost = UserId::generate();
        let service = LoadService::new(store.clone(), store.clone(), store, Duration::from_secs(1));

        assert_eq!(service.load(ghost).await, Err(LoadError::UserNotFound(ghost)));
    }
}
