use std::sync::Arc;

use application::{GroupRepository, MembershipRepository, MessageRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Group, GroupId, GroupName, GroupSummary, Membership, Message, MessageContent, MessageId,
    MessageWithSender, NewGroup, NewMessage, NewUser, PasswordHash, RepositoryError, Timestamp,
    User, UserEmail, UserId, Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn to_count(value: i64) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| invalid_data(format!("negative count: {value}")))
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    is_anonymous: bool,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            email,
            password,
            is_anonymous: value.is_anonymous,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GroupRecord {
    id: i64,
    name: String,
    description: Option<String>,
    created_by: Option<i64>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<GroupRecord> for Group {
    type Error = RepositoryError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        let name = GroupName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Group {
            id: GroupId::from(value.id),
            name,
            description: value.description,
            created_by: value.created_by.map(UserId::from),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GroupSummaryRecord {
    #[sqlx(flatten)]
    group: GroupRecord,
    member_count: i64,
}

impl TryFrom<GroupSummaryRecord> for GroupSummary {
    type Error = RepositoryError;

    fn try_from(value: GroupSummaryRecord) -> Result<Self, Self::Error> {
        Ok(GroupSummary {
            group: Group::try_from(value.group)?,
            member_count: to_count(value.member_count)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct MemberRecord {
    group_id: i64,
    user_id: i64,
    joined_at: Timestamp,
}

impl From<MemberRecord> for Membership {
    fn from(value: MemberRecord) -> Self {
        Membership::new(
            GroupId::from(value.group_id),
            UserId::from(value.user_id),
            value.joined_at,
        )
    }
}

/// 消息行连同发送者当前的用户名与匿名设置
#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    group_id: i64,
    user_id: i64,
    content: String,
    is_anonymous: bool,
    created_at: Timestamp,
    sender_username: String,
    sender_is_anonymous: bool,
}

impl TryFrom<MessageRecord> for MessageWithSender {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        let sender_username =
            Username::parse(value.sender_username).map_err(|err| invalid_data(err.to_string()))?;

        Ok(MessageWithSender {
            message: Message {
                id: MessageId::from(value.id),
                group_id: GroupId::from(value.group_id),
                user_id: UserId::from(value.user_id),
                content,
                is_anonymous: value.is_anonymous,
                created_at: value.created_at,
            },
            sender_username,
            sender_is_anonymous: value.sender_is_anonymous,
        })
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
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (username, email, password_hash, is_anonymous, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, $4, $4)
            RETURNING id, username, email, password_hash, is_anonymous, created_at, updated_at
            "#,
        )
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, is_anonymous, created_at, updated_at
            FROM users WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, password_hash, is_anonymous, created_at, updated_at
            FROM users WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn set_anonymous(
        &self,
        id: UserId,
        is_anonymous: bool,
        updated_at: Timestamp,
    ) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users SET is_anonymous = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, username, email, password_hash, is_anonymous, created_at, updated_at
            "#,
        )
        .bind(id.value())
        .bind(is_anonymous)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        User::try_from(record)
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
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn create_with_creator(&self, group: NewGroup) -> Result<Group, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, GroupRecord>(
            r#"
            INSERT INTO chat_groups (name, description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(group.name.as_str())
        .bind(group.description.as_deref())
        .bind(group.created_by.value())
        .bind(group.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.id)
        .bind(group.created_by.value())
        .bind(group.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Group::try_from(record)
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        let record = sqlx::query_as::<_, GroupRecord>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_at
            FROM chat_groups WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Group::try_from).transpose()
    }

    async fn list_for_member(&self, user_id: UserId) -> Result<Vec<GroupSummary>, RepositoryError> {
        let records = sqlx::query_as::<_, GroupSummaryRecord>(
            r#"
            SELECT g.id, g.name, g.description, g.created_by, g.created_at, g.updated_at,
                   (SELECT COUNT(*) FROM group_members c WHERE c.group_id = g.id) AS member_count
            FROM chat_groups g
            JOIN group_members gm ON gm.group_id = g.id
            WHERE gm.user_id = $1
            ORDER BY g.created_at DESC, g.id DESC
            "#,
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(GroupSummary::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn add(&self, membership: Membership) -> Result<Membership, RepositoryError> {
        let record = sqlx::query_as::<_, MemberRecord>(
            r#"
            INSERT INTO group_members (group_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            RETURNING group_id, user_id, joined_at
            "#,
        )
        .bind(membership.group_id.value())
        .bind(membership.user_id.value())
        .bind(membership.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Membership::from(record))
    }

    async fn exists(&self, group_id: GroupId, user_id: UserId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group_id.value())
        .bind(user_id.value())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)
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
    async fn create(&self, message: NewMessage) -> Result<MessageWithSender, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (group_id, user_id, content, is_anonymous, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, group_id, user_id, content, is_anonymous, created_at
            )
            SELECT i.id, i.group_id, i.user_id, i.content, i.is_anonymous, i.created_at,
                   u.username AS sender_username, u.is_anonymous AS sender_is_anonymous
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(message.group_id.value())
        .bind(message.user_id.value())
        .bind(message.content.as_str())
        .bind(message.is_anonymous)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        MessageWithSender::try_from(record)
    }

    async fn list_recent(
        &self,
        group_id: GroupId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageWithSender>, RepositoryError> {
        let offset = i64::try_from(offset).map_err(|_| invalid_data("offset out of range"))?;
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT m.id, m.group_id, m.user_id, m.content, m.is_anonymous, m.created_at,
                   u.username AS sender_username, u.is_anonymous AS sender_is_anonymous
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(group_id.value())
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records
            .into_iter()
            .map(MessageWithSender::try_from)
            .collect()
    }

    async fn count_by_group(&self, group_id: GroupId) -> Result<u64, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE group_id = $1")
            .bind(group_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        to_count(total)
    }
}

/// 共享同一个连接池的全部 Postgres 仓储
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub group_repository: Arc<PgGroupRepository>,
    pub membership_repository: Arc<PgMembershipRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            group_repository: Arc::new(PgGroupRepository::new(pool.clone())),
            membership_repository: Arc::new(PgMembershipRepository::new(pool.clone())),
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
