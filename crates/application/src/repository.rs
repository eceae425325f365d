use async_trait::async_trait;
use domain::{
    Group, GroupId, GroupSummary, Membership, MessageWithSender, NewGroup, NewMessage, NewUser,
    RepositoryError, Timestamp, User, UserEmail, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 邮箱或用户名重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn set_anonymous(
        &self,
        id: UserId,
        is_anonymous: bool,
        updated_at: Timestamp,
    ) -> Result<User, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// 在同一个事务里创建群组并把创建者加为成员
    async fn create_with_creator(&self, group: NewGroup) -> Result<Group, RepositoryError>;
    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError>;
    /// 用户所在的群组，按创建时间倒序
    async fn list_for_member(&self, user_id: UserId) -> Result<Vec<GroupSummary>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// 重复加入时返回 `RepositoryError::Conflict`
    async fn add(&self, membership: Membership) -> Result<Membership, RepositoryError>;
    async fn exists(&self, group_id: GroupId, user_id: UserId) -> Result<bool, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: NewMessage) -> Result<MessageWithSender, RepositoryError>;

    // 最新的在前：created_at 倒序，同一时刻按 id 倒序
    async fn list_recent(
        &self,
        group_id: GroupId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageWithSender>, RepositoryError>;

    async fn count_by_group(&self, group_id: GroupId) -> Result<u64, RepositoryError>;
}
