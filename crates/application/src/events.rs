//! WebSocket 帧格式
//!
//! 每一帧都是 `{"event": "...", "data": ...}`，事件名使用 kebab-case。

use domain::GroupId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::ConnectionId;

/// 群组内的一条实时消息。`message` 原样转发，服务端不解释其内容。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessagePayload {
    pub group_id: GroupId,
    pub message: Value,
}

/// 客户端发来的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinGroup(GroupId),
    LeaveGroup(GroupId),
    /// 不落库、不鉴权，直接转发给群组内所有连接（包括发送者自己）
    SendMessage(GroupMessagePayload),
    Ping,
}

/// 服务端推送的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },
    #[serde(rename_all = "camelCase")]
    JoinedGroup { group_id: GroupId },
    #[serde(rename_all = "camelCase")]
    LeftGroup { group_id: GroupId },
    NewMessage(GroupMessagePayload),
    Error { message: String },
    Pong,
}

impl ServerEvent {
    pub fn new_message(group_id: GroupId, message: Value) -> Self {
        Self::NewMessage(GroupMessagePayload { group_id, message })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
