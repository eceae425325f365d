//! 进程内存储
//!
//! 与 Postgres 实现语义一致：唯一约束返回 `Conflict`，
//! 群组与创建者成员关系在同一把锁内写入。用于测试和本地演示。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use application::{GroupRepository, MembershipRepository, MessageRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Group, GroupId, GroupSummary, Membership, Message, MessageId, MessageWithSender, NewGroup,
    NewMessage, NewUser, RepositoryError, Timestamp, User, UserEmail, UserId,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_user_id: i64,
    next_group_id: i64,
    next_message_id: i64,
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    memberships: HashMap<(GroupId, UserId), Membership>,
    messages: Vec<Message>,
}

impl State {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn with_sender(&self, message: &Message) -> Result<MessageWithSender, RepositoryError> {
        let sender = self
            .users
            .get(&message.user_id)
            .ok_or_else(|| RepositoryError::storage("message sender is missing"))?;
        Ok(MessageWithSender {
            message: message.clone(),
            sender_username: sender.username.clone(),
            sender_is_anonymous: sender.is_anonymous,
        })
    }

    fn member_count(&self, group_id: GroupId) -> u64 {
        self.memberships
            .keys()
            .filter(|(group, _)| *group == group_id)
            .count() as u64
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<RwLock<State>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStorage {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        let duplicate = state
            .users
            .values()
            .any(|existing| existing.email == user.email || existing.username == user.username);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let id = UserId::new(State::next_id(&mut state.next_user_id));
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            password: user.password,
            is_anonymous: false,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        state.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn set_anonymous(
        &self,
        id: UserId,
        is_anonymous: bool,
        updated_at: Timestamp,
    ) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.set_anonymous(is_anonymous, updated_at);
        Ok(user.clone())
    }
}

#[async_trait]
impl GroupRepository for InMemoryStorage {
    async fn create_with_creator(&self, group: NewGroup) -> Result<Group, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&group.created_by) {
            return Err(RepositoryError::storage("group creator does not exist"));
        }

        let id = GroupId::new(State::next_id(&mut state.next_group_id));
        let stored = Group {
            id,
            name: group.name,
            description: group.description,
            created_by: Some(group.created_by),
            created_at: group.created_at,
            updated_at: group.created_at,
        };
        state.groups.insert(id, stored.clone());
        state.memberships.insert(
            (id, group.created_by),
            Membership::new(id, group.created_by, group.created_at),
        );
        Ok(stored)
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }

    async fn list_for_member(&self, user_id: UserId) -> Result<Vec<GroupSummary>, RepositoryError> {
        let state = self.state.read().await;
        let mut groups: Vec<GroupSummary> = state
            .groups
            .values()
            .filter(|group| state.memberships.contains_key(&(group.id, user_id)))
            .map(|group| GroupSummary {
                group: group.clone(),
                member_count: state.member_count(group.id),
            })
            .collect();
        groups.sort_by(|a, b| {
            (b.group.created_at, b.group.id).cmp(&(a.group.created_at, a.group.id))
        });
        Ok(groups)
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStorage {
    async fn add(&self, membership: Membership) -> Result<Membership, RepositoryError> {
        let mut state = self.state.write().await;
        let key = (membership.group_id, membership.user_id);
        if state.memberships.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        if !state.groups.contains_key(&membership.group_id)
            || !state.users.contains_key(&membership.user_id)
        {
            return Err(RepositoryError::storage("membership references a missing row"));
        }
        state.memberships.insert(key, membership.clone());
        Ok(membership)
    }

    async fn exists(&self, group_id: GroupId, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .contains_key(&(group_id, user_id)))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStorage {
    async fn create(&self, message: NewMessage) -> Result<MessageWithSender, RepositoryError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&message.group_id) {
            return Err(RepositoryError::storage("message group does not exist"));
        }

        let id = MessageId::new(State::next_id(&mut state.next_message_id));
        let stored = Message {
            id,
            group_id: message.group_id,
            user_id: message.user_id,
            content: message.content,
            is_anonymous: message.is_anonymous,
            created_at: message.created_at,
        };
        let record = state.with_sender(&stored)?;
        state.messages.push(stored);
        Ok(record)
    }

    async fn list_recent(
        &self,
        group_id: GroupId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageWithSender>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<&Message> = state
            .messages
            .iter()
            .filter(|message| message.group_id == group_id)
            .collect();
        messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        messages
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|message| state.with_sender(message))
            .collect()
    }

    async fn count_by_group(&self, group_id: GroupId) -> Result<u64, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|message| message.group_id == group_id)
            .count() as u64)
    }
}
