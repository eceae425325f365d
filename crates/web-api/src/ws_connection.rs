//! WebSocket 投递网关
//!
//! 每个连接在 Hub 中登记一个有界发件箱。发送任务把发件箱里的帧写到 socket，
//! 接收任务解析客户端事件并调用 Hub。任一任务结束即视为连接断开，
//! 守卫析构时从 Hub 中移除该连接。

use application::{ClientEvent, ConnectionId, Frame, Outbox, ServerEvent};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::state::AppState;

/// 单个 WebSocket 连接
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user_id: Option<UserId>,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: Option<UserId>) -> Self {
        Self {
            socket,
            state,
            user_id,
        }
    }

    /// 运行连接直到任一方向结束
    pub async fn run(self) {
        let Self {
            socket,
            state,
            user_id,
        } = self;

        let (outbox, mut frames) = mpsc::channel::<Frame>(state.outbox_capacity);
        let hub = state.hub.clone();
        let connection_id = hub.connect(outbox.clone());
        let _guard = hub.guard(connection_id);
        if let Some(user_id) = user_id {
            hub.identify(connection_id, user_id);
        }
        tracing::info!(
            connection_id = %connection_id,
            user_id = ?user_id.map(|id| id.value()),
            "websocket connected"
        );

        let (mut sender, mut incoming) = socket.split();
        reply(&outbox, connection_id, &ServerEvent::Connected { connection_id });

        let mut send_task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if sender
                    .send(WsMessage::Text(frame.to_string().into()))
                    .await
                    .is_err()
                {
                    tracing::debug!(connection_id = %connection_id, "socket write failed");
                    break;
                }
            }
        });

        let mut recv_task = tokio::spawn({
            let state = state.clone();
            async move {
                while let Some(Ok(message)) = incoming.next().await {
                    match message {
                        WsMessage::Text(text) => {
                            handle_text(&state, &outbox, connection_id, text.as_str());
                        }
                        WsMessage::Close(_) => break,
                        // ping/pong 由底层协议栈处理，二进制帧不在协议内
                        _ => {}
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        tracing::info!(connection_id = %connection_id, "websocket disconnected");
    }
}

fn handle_text(state: &AppState, outbox: &Outbox, connection_id: ConnectionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(connection_id = %connection_id, error = %err, "invalid client event");
            reply(outbox, connection_id, &ServerEvent::error("Invalid event"));
            return;
        }
    };

    match event {
        ClientEvent::JoinGroup(group_id) => {
            state.hub.subscribe(connection_id, group_id);
            reply(outbox, connection_id, &ServerEvent::JoinedGroup { group_id });
        }
        ClientEvent::LeaveGroup(group_id) => {
            state.hub.unsubscribe(connection_id, group_id);
            reply(outbox, connection_id, &ServerEvent::LeftGroup { group_id });
        }
        ClientEvent::SendMessage(payload) => {
            let group_id = payload.group_id;
            if let Err(err) = state
                .hub
                .broadcast(group_id, &ServerEvent::NewMessage(payload))
            {
                tracing::warn!(
                    connection_id = %connection_id,
                    group_id = %group_id,
                    error = %err,
                    "failed to relay message"
                );
            }
        }
        ClientEvent::Ping => reply(outbox, connection_id, &ServerEvent::Pong),
    }
}

/// 直接回复当前连接，和广播一样走发件箱，队列满时丢弃
fn reply(outbox: &Outbox, connection_id: ConnectionId, event: &ServerEvent) {
    let frame: Frame = match serde_json::to_string(event) {
        Ok(json) => json.into(),
        Err(err) => {
            tracing::warn!(connection_id = %connection_id, error = %err, "failed to encode reply");
            return;
        }
    };
    if let Err(TrySendError::Full(_)) = outbox.try_send(frame) {
        tracing::warn!(connection_id = %connection_id, "outbox full, dropping reply");
    }
}
