use crate::value_objects::{GroupId, MessageContent, MessageId, Timestamp, UserId, Username};

/// 匿名消息对外展示的名字
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// 待持久化的新消息。
///
/// `is_anonymous` 取自发送请求本身（缺省为 false），与用户当前的匿名设置无关。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: MessageContent,
    pub is_anonymous: bool,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,
    pub user_id: UserId,
    pub content: MessageContent,
    /// 创建时的匿名快照，之后不会再变
    pub is_anonymous: bool,
    pub created_at: Timestamp,
}

impl Message {
    /// 展示名只看消息自身的匿名标记，不看发送者当前的设置。
    pub fn display_name<'a>(&self, sender_username: &'a Username) -> &'a str {
        if self.is_anonymous {
            ANONYMOUS_DISPLAY_NAME
        } else {
            sender_username.as_str()
        }
    }
}

/// 消息连同发送者在读取时刻的资料。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWithSender {
    pub message: Message,
    pub sender_username: Username,
    pub sender_is_anonymous: bool,
}

impl MessageWithSender {
    pub fn display_name(&self) -> &str {
        self.message.display_name(&self.sender_username)
    }
}
