use std::collections::HashMap;

use async_trait::async_trait;
use domain::{
    ChatMessage, Friend, FriendRepository, Group, GroupId, GroupMember, GroupRepository,
    MessageId, MessageRepository, Page, RepositoryError, RepositoryResult, Room, RoomId,
    RoomRepository, User, UserId, UserRepository,
};
use tokio::sync::RwLock;

/// 同时实现全部存储接口的内存仓库
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    friends: RwLock<Vec<Friend>>,
    groups: RwLock<HashMap<GroupId, Group>>,
    members: RwLock<HashMap<GroupId, Vec<GroupMember>>>,
    rooms: RwLock<HashMap<RoomId, Room>>,
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: User) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.uid) || users.values().any(|u| u.account == user.account) {
            return Err(RepositoryError::Conflict);
        }
        users.insert(user.uid, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.uid != user.uid && u.account == user.account)
        {
            return Err(RepositoryError::Conflict);
        }
        match users.get_mut(&user.uid) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user)
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_by_id(&self, uid: UserId) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&uid).cloned())
    }

    async fn find_by_ids(&self, uids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(uids.iter().filter_map(|uid| users.get(uid).cloned()).collect())
    }

    async fn search_by_account(&self, pattern: &str) -> RepositoryResult<Vec<User>> {
        let users = self.users.read().await;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| contains_ignore_case(&u.account, pattern))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.account.cmp(&b.account));
        Ok(found)
    }
}

#[async_trait]
impl FriendRepository for InMemoryStore {
    async fn create(&self, friend: Friend) -> RepositoryResult<Friend> {
        let mut friends = self.friends.write().await;
        let exists = friends
            .iter()
            .any(|f| f.involves(friend.friend_a) && f.involves(friend.friend_b));
        if exists {
            return Err(RepositoryError::Conflict);
        }
        friends.push(friend.clone());
        Ok(friend)
    }

    async fn find(&self, a: UserId, b: UserId) -> RepositoryResult<Option<Friend>> {
        let friends = self.friends.read().await;
        Ok(friends
            .iter()
            .find(|f| f.involves(a) && f.involves(b))
            .cloned())
    }

    async fn delete(&self, a: UserId, b: UserId) -> RepositoryResult<Friend> {
        let mut friends = self.friends.write().await;
        let index = friends
            .iter()
            .position(|f| f.involves(a) && f.involves(b))
            .ok_or(RepositoryError::NotFound)?;
        Ok(friends.remove(index))
    }

    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Friend>> {
        let friends = self.friends.read().await;
        Ok(friends.iter().filter(|f| f.involves(uid)).cloned().collect())
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn create(&self, group: Group) -> RepositoryResult<Group> {
        let mut groups = self.groups.write().await;
        if groups.contains_key(&group.group_id) {
            return Err(RepositoryError::Conflict);
        }
        groups.insert(group.group_id, group.clone());
        // 创建者自动成为成员
        self.members.write().await.insert(
            group.group_id,
            vec![GroupMember {
                group_id: group.group_id,
                uid: group.admin,
                joined_at: group.created_at,
            }],
        );
        Ok(group)
    }

    async fn find_by_id(&self, group_id: GroupId) -> RepositoryResult<Option<Group>> {
        Ok(self.groups.read().await.get(&group_id).cloned())
    }

    async fn search_by_name(&self, pattern: &str) -> RepositoryResult<Vec<Group>> {
        let groups = self.groups.read().await;
        let mut found: Vec<Group> = groups
            .values()
            .filter(|g| contains_ignore_case(&g.name, pattern))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn add_member(&self, member: GroupMember) -> RepositoryResult<GroupMember> {
        if !self.groups.read().await.contains_key(&member.group_id) {
            return Err(RepositoryError::NotFound);
        }
        let mut members = self.members.write().await;
        let list = members.entry(member.group_id).or_default();
        if list.iter().any(|m| m.uid == member.uid) {
            return Err(RepositoryError::Conflict);
        }
        list.push(member.clone());
        Ok(member)
    }

    async fn add_members(
        &self,
        group_id: GroupId,
        new_members: Vec<GroupMember>,
    ) -> RepositoryResult<usize> {
        if !self.groups.read().await.contains_key(&group_id) {
            return Err(RepositoryError::NotFound);
        }
        let mut members = self.members.write().await;
        let list = members.entry(group_id).or_default();
        let mut added = 0;
        for member in new_members {
            if list.iter().any(|m| m.uid == member.uid) {
                continue;
            }
            list.push(member);
            added += 1;
        }
        Ok(added)
    }

    async fn remove_member(&self, group_id: GroupId, uid: UserId) -> RepositoryResult<()> {
        let mut members = self.members.write().await;
        let list = members.get_mut(&group_id).ok_or(RepositoryError::NotFound)?;
        let index = list
            .iter()
            .position(|m| m.uid == uid)
            .ok_or(RepositoryError::NotFound)?;
        list.remove(index);
        Ok(())
    }

    async fn list_members(&self, group_id: GroupId) -> RepositoryResult<Vec<UserId>> {
        if !self.groups.read().await.contains_key(&group_id) {
            return Err(RepositoryError::NotFound);
        }
        let members = self.members.read().await;
        Ok(members
            .get(&group_id)
            .map(|list| list.iter().map(|m| m.uid).collect())
            .unwrap_or_default())
    }

    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Group>> {
        let groups = self.groups.read().await;
        let members = self.members.read().await;
        let mut joined: Vec<Group> = members
            .iter()
            .filter(|(_, list)| list.iter().any(|m| m.uid == uid))
            .filter_map(|(group_id, _)| groups.get(group_id).cloned())
            .collect();
        joined.sort_by_key(|g| g.created_at);
        Ok(joined)
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create(&self, room: Room) -> RepositoryResult<Room> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.room_id) {
            return Err(RepositoryError::Conflict);
        }
        rooms.insert(room.room_id, room.clone());
        Ok(room)
    }

    async fn find_by_id(&self, room_id: RoomId) -> RepositoryResult<Option<Room>> {
        Ok(self.rooms.read().await.get(&room_id).cloned())
    }

    async fn delete(&self, room_id: RoomId) -> RepositoryResult<()> {
        self.rooms
            .write()
            .await
            .remove(&room_id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn save(&self, message: ChatMessage) -> RepositoryResult<()> {
        let mut messages = self.messages.write().await;
        let id: MessageId = message.id;
        if messages.iter().any(|m| m.id == id) {
            return Err(RepositoryError::Conflict);
        }
        messages.push(message);
        Ok(())
    }

    async fn list_by_room(&self, room_id: RoomId, page: Page) -> RepositoryResult<Vec<ChatMessage>> {
        let messages = self.messages.read().await;
        let mut in_room: Vec<&ChatMessage> =
            messages.iter().rev().filter(|m| m.to == room_id).collect();
        // 稳定排序：时间戳相同的按写入顺序倒序
        in_room.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(in_room
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::{MessageContent, PasswordHash};

    fn user(account: &str) -> User {
        User::new(UserId::generate(), account, PasswordHash::default(), "").unwrap()
    }

    #[tokio::test]
    async fn friend_edges_are_order_independent() {
        let store = InMemoryStore::new();
        let a = UserId::generate();
        let b = UserId::generate();
        FriendRepository::create(&store, Friend::new(a, b, RoomId::generate(), Utc::now()).unwrap())
            .await
            .unwrap();

        assert!(store.find(b, a).await.unwrap().is_some());
        let duplicate = Friend::new(b, a, RoomId::generate(), Utc::now()).unwrap();
        assert_eq!(
            FriendRepository::create(&store, duplicate).await,
            Err(RepositoryError::Conflict)
        );
        FriendRepository::delete(&store, b, a).await.unwrap();
        assert_eq!(
            FriendRepository::delete(&store, a, b).await,
            Err(RepositoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn group_admin_is_first_member() {
        let store = InMemoryStore::new();
        let admin = UserId::generate();
        let group = Group::new(GroupId::generate(), "g", admin, Utc::now()).unwrap();
        GroupRepository::create(&store, group.clone()).await.unwrap();

        assert_eq!(store.list_members(group.group_id).await.unwrap(), vec![admin]);
        assert_eq!(
            store.list_members(GroupId::generate()).await,
            Err(RepositoryError::NotFound)
        );
        let groups = GroupRepository::list_by_user(&store, admin).await.unwrap();
        assert_eq!(groups, vec![group]);
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let store = InMemoryStore::new();
        let room = RoomId::generate();
        let from = UserId::generate();
        let start = Utc::now();
        for i in 0..5 {
            let message = ChatMessage::new(
                MessageId::generate(),
                from,
                room,
                MessageContent::text(format!("m{}", i)),
                "text",
                start + Duration::seconds(i),
            )
            .unwrap();
            store.save(message).await.unwrap();
        }

        let first = store.list_by_room(room, Page::new(1, 2)).await.unwrap();
        let texts: Vec<_> = first.iter().map(|m| m.content.clone()).collect();
        assert_eq!(texts, vec![MessageContent::text("m4"), MessageContent::text("m3")]);

        let last = store.list_by_room(room, Page::new(3, 2)).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].content, MessageContent::text("m0"));
    }

    #[tokio::test]
    async fn account_search_is_case_insensitive() {
        let store = InMemoryStore::new();
        UserRepository::create(&store, user("Alice")).await.unwrap();
        UserRepository::create(&store, user("bob")).await.unwrap();

        let found = store.search_by_account("ali").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].account, "Alice");
    }
}
