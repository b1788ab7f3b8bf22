use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    ChatMessage, Friend, FriendRepository, Group, GroupId, GroupMember, GroupRepository,
    MessageContent, MessageId, MessageRepository, Page, PasswordHash, RepositoryError,
    RepositoryResult, Room, RoomId, RoomRepository, User, UserId, UserRepository,
};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

/// LIKE 模式，转义通配符
fn like_pattern(pattern: &str) -> String {
    let escaped = pattern
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    uid: Uuid,
    account: String,
    password: String,
    avatar: String,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let password = if value.password.is_empty() {
            PasswordHash::default()
        } else {
            PasswordHash::new(value.password).map_err(|err| invalid_data(err.to_string()))?
        };
        User::new(UserId::from(value.uid), value.account, password, value.avatar)
            .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Debug, FromRow)]
struct FriendRecord {
    friend_a: Uuid,
    friend_b: Uuid,
    room_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<FriendRecord> for Friend {
    fn from(value: FriendRecord) -> Self {
        Friend {
            friend_a: UserId::from(value.friend_a),
            friend_b: UserId::from(value.friend_b),
            room_id: RoomId::from(value.room_id),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct GroupRecord {
    group_id: Uuid,
    name: String,
    admin: Uuid,
    created_at: DateTime<Utc>,
}

impl From<GroupRecord> for Group {
    fn from(value: GroupRecord) -> Self {
        Group {
            group_id: GroupId::from(value.group_id),
            name: value.name,
            admin: UserId::from(value.admin),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    room_id: Uuid,
    one_to_one: bool,
    members: Vec<Uuid>,
}

impl From<RoomRecord> for Room {
    fn from(value: RoomRecord) -> Self {
        Room {
            room_id: RoomId::from(value.room_id),
            one_to_one: value.one_to_one,
            members: value.members.into_iter().map(UserId::from).collect(),
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    from_uid: Uuid,
    to_room: Uuid,
    content: Json<MessageContent>,
    message_type: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRecord> for ChatMessage {
    fn from(value: MessageRecord) -> Self {
        ChatMessage {
            id: MessageId::from(value.id),
            from: UserId::from(value.from_uid),
            to: RoomId::from(value.to_room),
            content: value.content.0,
            message_type: value.message_type,
            timestamp: value.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> RepositoryResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (uid, account, password, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING uid, account, password, avatar
            "#,
        )
        .bind(Uuid::from(user.uid))
        .bind(&user.account)
        .bind(user.password.as_str())
        .bind(&user.avatar)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn update(&self, user: User) -> RepositoryResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET account = $2, password = $3, avatar = $4
            WHERE uid = $1
            RETURNING uid, account, password, avatar
            "#,
        )
        .bind(Uuid::from(user.uid))
        .bind(&user.account)
        .bind(user.password.as_str())
        .bind(&user.avatar)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, uid: UserId) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT uid, account, password, avatar FROM users WHERE uid = $1"#,
        )
        .bind(Uuid::from(uid))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_ids(&self, uids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let ids: Vec<Uuid> = uids.iter().copied().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, UserRecord>(
            r#"SELECT uid, account, password, avatar FROM users WHERE uid = ANY($1)"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn search_by_account(&self, pattern: &str) -> RepositoryResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT uid, account, password, avatar FROM users
            WHERE account ILIKE $1
            ORDER BY account
            LIMIT 50
            "#,
        )
        .bind(like_pattern(pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgFriendRepository {
    pool: PgPool,
}

impl PgFriendRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendRepository for PgFriendRepository {
    async fn create(&self, friend: Friend) -> RepositoryResult<Friend> {
        let record = sqlx::query_as::<_, FriendRecord>(
            r#"
            INSERT INTO friends (friend_a, friend_b, room_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING friend_a, friend_b, room_id, created_at
            "#,
        )
        .bind(Uuid::from(friend.friend_a))
        .bind(Uuid::from(friend.friend_b))
        .bind(Uuid::from(friend.room_id))
        .bind(friend.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn find(&self, a: UserId, b: UserId) -> RepositoryResult<Option<Friend>> {
        let record = sqlx::query_as::<_, FriendRecord>(
            r#"
            SELECT friend_a, friend_b, room_id, created_at FROM friends
            WHERE (friend_a = $1 AND friend_b = $2) OR (friend_a = $2 AND friend_b = $1)
            "#,
        )
        .bind(Uuid::from(a))
        .bind(Uuid::from(b))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Friend::from))
    }

    async fn delete(&self, a: UserId, b: UserId) -> RepositoryResult<Friend> {
        let record = sqlx::query_as::<_, FriendRecord>(
            r#"
            DELETE FROM friends
            WHERE (friend_a = $1 AND friend_b = $2) OR (friend_a = $2 AND friend_b = $1)
            RETURNING friend_a, friend_b, room_id, created_at
            "#,
        )
        .bind(Uuid::from(a))
        .bind(Uuid::from(b))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        Ok(record.into())
    }

    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Friend>> {
        let records = sqlx::query_as::<_, FriendRecord>(
            r#"
            SELECT friend_a, friend_b, room_id, created_at FROM friends
            WHERE friend_a = $1 OR friend_b = $1
            ORDER BY created_at
            "#,
        )
        .bind(Uuid::from(uid))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Friend::from).collect())
    }
}

#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, group_id: GroupId) -> RepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM groups WHERE group_id = $1)")
            .bind(Uuid::from(group_id))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn create(&self, group: Group) -> RepositoryResult<Group> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, GroupRecord>(
            r#"
            INSERT INTO groups (group_id, name, admin, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING group_id, name, admin, created_at
            "#,
        )
        .bind(Uuid::from(group.group_id))
        .bind(&group.name)
        .bind(Uuid::from(group.admin))
        .bind(group.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        // 创建者自动成为成员
        sqlx::query("INSERT INTO group_members (group_id, uid, joined_at) VALUES ($1, $2, $3)")
            .bind(Uuid::from(group.group_id))
            .bind(Uuid::from(group.admin))
            .bind(group.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(record.into())
    }

    async fn find_by_id(&self, group_id: GroupId) -> RepositoryResult<Option<Group>> {
        let record = sqlx::query_as::<_, GroupRecord>(
            r#"SELECT group_id, name, admin, created_at FROM groups WHERE group_id = $1"#,
        )
        .bind(Uuid::from(group_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Group::from))
    }

    async fn search_by_name(&self, pattern: &str) -> RepositoryResult<Vec<Group>> {
        let records = sqlx::query_as::<_, GroupRecord>(
            r#"
            SELECT group_id, name, admin, created_at FROM groups
            WHERE name ILIKE $1
            ORDER BY name
            LIMIT 50
            "#,
        )
        .bind(like_pattern(pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Group::from).collect())
    }

    async fn add_member(&self, member: GroupMember) -> RepositoryResult<GroupMember> {
        sqlx::query("INSERT INTO group_members (group_id, uid, joined_at) VALUES ($1, $2, $3)")
            .bind(Uuid::from(member.group_id))
            .bind(Uuid::from(member.uid))
            .bind(member.joined_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(member)
    }

    async fn add_members(
        &self,
        group_id: GroupId,
        members: Vec<GroupMember>,
    ) -> RepositoryResult<usize> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let mut added = 0;
        for member in members {
            let result = sqlx::query(
                r#"
                INSERT INTO group_members (group_id, uid, joined_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (group_id, uid) DO NOTHING
                "#,
            )
            .bind(Uuid::from(group_id))
            .bind(Uuid::from(member.uid))
            .bind(member.joined_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
            added += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(added)
    }

    async fn remove_member(&self, group_id: GroupId, uid: UserId) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND uid = $2")
            .bind(Uuid::from(group_id))
            .bind(Uuid::from(uid))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_members(&self, group_id: GroupId) -> RepositoryResult<Vec<UserId>> {
        if !self.exists(group_id).await? {
            return Err(RepositoryError::NotFound);
        }
        let uids = sqlx::query_scalar::<_, Uuid>(
            "SELECT uid FROM group_members WHERE group_id = $1 ORDER BY joined_at",
        )
        .bind(Uuid::from(group_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(uids.into_iter().map(UserId::from).collect())
    }

    async fn list_by_user(&self, uid: UserId) -> RepositoryResult<Vec<Group>> {
        let records = sqlx::query_as::<_, GroupRecord>(
            r#"
            SELECT g.group_id, g.name, g.admin, g.created_at
            FROM groups g
            JOIN group_members m ON m.group_id = g.group_id
            WHERE m.uid = $1
            ORDER BY g.created_at
            "#,
        )
        .bind(Uuid::from(uid))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Group::from).collect())
    }
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create(&self, room: Room) -> RepositoryResult<Room> {
        let members: Vec<Uuid> = room.members.iter().copied().map(Uuid::from).collect();
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (room_id, one_to_one, members)
            VALUES ($1, $2, $3)
            RETURNING room_id, one_to_one, members
            "#,
        )
        .bind(Uuid::from(room.room_id))
        .bind(room.one_to_one)
        .bind(&members)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn find_by_id(&self, room_id: RoomId) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT room_id, one_to_one, members FROM rooms WHERE room_id = $1"#,
        )
        .bind(Uuid::from(room_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Room::from))
    }

    async fn delete(&self, room_id: RoomId) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM rooms WHERE room_id = $1")
            .bind(Uuid::from(room_id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn save(&self, message: ChatMessage) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, from_uid, to_room, content, message_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.from))
        .bind(Uuid::from(message.to))
        .bind(Json(&message.content))
        .bind(&message.message_type)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn list_by_room(&self, room_id: RoomId, page: Page) -> RepositoryResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, from_uid, to_room, content, message_type, created_at
            FROM messages
            WHERE to_room = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(Uuid::from(room_id))
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(ChatMessage::from).collect())
    }
}

/// 全部 Postgres 存储
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub friend_repository: Arc<PgFriendRepository>,
    pub group_repository: Arc<PgGroupRepository>,
    pub room_repository: Arc<PgRoomRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            friend_repository: Arc::new(PgFriendRepository::new(pool.clone())),
            group_repository: Arc::new(PgGroupRepository::new(pool.clone())),
            room_repository: Arc::new(PgRoomRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
