use domain::{
    Group, GroupId, GroupSummary, MessageId, MessageWithSender, PageInfo, Timestamp, User, UserId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_anonymous: bool,
    pub created_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
            is_anonymous: user.is_anonymous,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDto {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Group> for GroupDto {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.as_str().to_owned(),
            description: group.description.clone(),
            created_by: group.created_by,
            created_at: group.created_at,
            updated_at: group.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummaryDto {
    #[serde(flatten)]
    pub group: GroupDto,
    pub member_count: u64,
}

impl From<&GroupSummary> for GroupSummaryDto {
    fn from(summary: &GroupSummary) -> Self {
        Self {
            group: GroupDto::from(&summary.group),
            member_count: summary.member_count,
        }
    }
}

/// 对外暴露的消息记录。`username` 已经是解析后的展示名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: MessageId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: String,
    pub is_anonymous: bool,
    pub created_at: Timestamp,
    pub username: String,
    /// 发送者当前的匿名设置，仅作提示
    pub user_is_anonymous: bool,
}

impl From<&MessageWithSender> for MessageDto {
    fn from(record: &MessageWithSender) -> Self {
        let message = &record.message;
        Self {
            id: message.id,
            group_id: message.group_id,
            user_id: message.user_id,
            content: message.content.as_str().to_owned(),
            is_anonymous: message.is_anonymous,
            created_at: message.created_at,
            username: record.display_name().to_owned(),
            user_is_anonymous: record.sender_is_anonymous,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePageDto {
    pub messages: Vec<MessageDto>,
    pub pagination: PageInfo,
}
