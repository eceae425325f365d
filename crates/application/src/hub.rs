//! 实时扇出中心
//!
//! 维护两张分片表：
//! - `connections`：连接 → {用户, 已订阅群组, 发送队列}
//! - `groups`：群组 → {连接 → 发送队列}，广播只遍历订阅者
//!
//! 所有修改都先锁连接条目再锁群组条目，顺序固定。广播只锁群组条目，
//! 在锁内克隆发送队列快照，释放后再投递。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use domain::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::broadcaster::{BroadcastError, DeliveryReport, MessageBroadcaster};
use crate::events::ServerEvent;

/// 已序列化的一帧，所有订阅者共享同一份
pub type Frame = Arc<str>;

/// 连接写任务的有界发送队列
pub type Outbox = mpsc::Sender<Frame>;

/// 进程内唯一的连接标识，单调递增，不会复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ConnectionEntry {
    user_id: Option<UserId>,
    groups: HashSet<GroupId>,
    outbox: Outbox,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub groups: usize,
    pub subscriptions: usize,
}

#[derive(Debug)]
pub struct FanoutHub {
    next_id: AtomicU64,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    groups: DashMap<GroupId, HashMap<ConnectionId, Outbox>>,
}

impl Default for FanoutHub {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// 注册新连接，初始没有用户也没有订阅。
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.insert(
            id,
            ConnectionEntry {
                user_id: None,
                groups: HashSet::new(),
                outbox,
            },
        );
        info!(connection_id = %id, "connection registered");
        id
    }

    /// 连接不存在时返回 false
    pub fn identify(&self, connection_id: ConnectionId, user_id: UserId) -> bool {
        match self.connections.get_mut(&connection_id) {
            Some(mut entry) => {
                entry.user_id = Some(user_id);
                debug!(connection_id = %connection_id, user_id = %user_id, "connection identified");
                true
            }
            None => false,
        }
    }

    /// 幂等。不做权限检查，返回值表示状态是否发生变化。
    pub fn subscribe(&self, connection_id: ConnectionId, group_id: GroupId) -> bool {
        let Some(mut connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.groups.insert(group_id) {
            return false;
        }
        self.groups
            .entry(group_id)
            .or_default()
            .insert(connection_id, connection.outbox.clone());
        drop(connection);

        debug!(connection_id = %connection_id, group_id = %group_id, "subscribed");
        true
    }

    /// 幂等，未订阅时什么也不做。
    pub fn unsubscribe(&self, connection_id: ConnectionId, group_id: GroupId) -> bool {
        let Some(mut connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.groups.remove(&group_id) {
            return false;
        }
        self.detach(connection_id, group_id);
        drop(connection);

        debug!(connection_id = %connection_id, group_id = %group_id, "unsubscribed");
        true
    }

    /// 把事件投递给群组当前的所有订阅者。
    ///
    /// 只有序列化失败会返回错误；单个订阅者队列满或已关闭时跳过并记日志，
    /// 不影响其他订阅者。
    pub fn broadcast(
        &self,
        group_id: GroupId,
        event: &ServerEvent,
    ) -> Result<DeliveryReport, BroadcastError> {
        let frame: Frame = serde_json::to_string(event)?.into();

        let recipients: Vec<(ConnectionId, Outbox)> = match self.groups.get(&group_id) {
            Some(subscribers) => subscribers
                .iter()
                .map(|(id, outbox)| (*id, outbox.clone()))
                .collect(),
            None => Vec::new(),
        };

        let mut report = DeliveryReport::default();
        for (connection_id, outbox) in recipients {
            match outbox.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        connection_id = %connection_id,
                        group_id = %group_id,
                        "outbox full, dropping frame"
                    );
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        connection_id = %connection_id,
                        group_id = %group_id,
                        "connection closed before delivery"
                    );
                    report.dropped += 1;
                }
            }
        }

        debug!(
            group_id = %group_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast finished"
        );
        Ok(report)
    }

    /// 从注册表和所有群组索引中移除连接。重复调用无副作用。
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&connection_id) else {
            return;
        };
        for group_id in &entry.groups {
            self.detach(connection_id, *group_id);
        }
        info!(
            connection_id = %connection_id,
            groups = entry.groups.len(),
            "connection removed"
        );
    }

    /// 返回一个在析构时调用 `disconnect` 的守卫
    pub fn guard(self: &Arc<Self>, connection_id: ConnectionId) -> ConnectionGuard {
        ConnectionGuard {
            hub: Arc::clone(self),
            connection_id,
        }
    }

    pub fn subscribers(&self, group_id: GroupId) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .groups
            .get(&group_id)
            .map(|subscribers| subscribers.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn subscriptions(&self, connection_id: ConnectionId) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self
            .connections
            .get(&connection_id)
            .map(|entry| entry.groups.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.connections
            .get(&connection_id)
            .and_then(|entry| entry.user_id)
    }

    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn stats(&self) -> HubStats {
        let subscriptions = self
            .groups
            .iter()
            .map(|subscribers| subscribers.len())
            .sum();
        HubStats {
            connections: self.connections.len(),
            groups: self.groups.len(),
            subscriptions,
        }
    }

    fn detach(&self, connection_id: ConnectionId, group_id: GroupId) {
        let now_empty = match self.groups.get_mut(&group_id) {
            Some(mut subscribers) => {
                subscribers.remove(&connection_id);
                subscribers.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.groups
                .remove_if(&group_id, |_, subscribers| subscribers.is_empty());
        }
    }
}

#[async_trait]
impl MessageBroadcaster for FanoutHub {
    async fn broadcast(
        &self,
        group_id: GroupId,
        event: ServerEvent,
    ) -> Result<DeliveryReport, BroadcastError> {
        FanoutHub::broadcast(self, group_id, &event)
    }
}

/// 连接的生命周期守卫，任何退出路径（包括任务被取消）都会清理注册表。
#[derive(Debug)]
pub struct ConnectionGuard {
    hub: Arc<FanoutHub>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.disconnect(self.connection_id);
    }
}
