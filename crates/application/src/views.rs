//! 面向客户端的反范式视图
//!
//! 好友边 + 对方公开资料，群组 + 成员列表。

use std::collections::HashMap;

use domain::{
    Friend, FriendData, Group, GroupData, GroupRepository, RepositoryResult, User, UserId,
    UserRepository,
};

/// 站在 `uid` 的角度，把好友边展开成带资料的列表
pub async fn friend_datas(
    uid: UserId,
    edges: Vec<Friend>,
    users: &dyn UserRepository,
) -> RepositoryResult<Vec<FriendData>> {
    let others: Vec<UserId> = edges.iter().filter_map(|edge| edge.other(uid)).collect();
    if others.is_empty() {
        return Ok(Vec::new());
    }

    let profiles: HashMap<UserId, User> = users
        .find_by_ids(&others)
        .await?
        .into_iter()
        .map(|user| (user.uid, user))
        .collect();

    let mut datas = Vec::with_capacity(edges.len());
    for edge in &edges {
        let Some(other) = edge.other(uid) else { continue };
        match profiles.get(&other) {
            Some(profile) => datas.push(FriendData::from_edge(edge, profile)),
            None => tracing::warn!(uid = %uid, friend = %other, "好友资料缺失，跳过"),
        }
    }
    Ok(datas)
}

pub async fn group_datas(
    groups: Vec<Group>,
    store: &dyn GroupRepository,
) -> RepositoryResult<Vec<GroupData>> {
    let mut datas = Vec::with_capacity(groups.len());
    for group in groups {
        let members = store.list_members(group.group_id).await?;
        datas.push(GroupData { group, members });
    }
    Ok(datas)
}
