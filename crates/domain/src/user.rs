use crate::value_objects::{PasswordHash, Timestamp, UserEmail, UserId, Username};

/// 待持久化的新用户，ID 由存储层分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: Username,
    pub email: UserEmail,
    pub password: PasswordHash,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    /// 当前的匿名偏好，只影响之后发送的消息
    pub is_anonymous: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn set_anonymous(&mut self, is_anonymous: bool, now: Timestamp) {
        self.is_anonymous = is_anonymous;
        self.updated_at = now;
    }
}
