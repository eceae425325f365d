use async_trait::async_trait;
use domain::GroupId;
use serde::Serialize;
use thiserror::Error;

use crate::events::ServerEvent;

/// 一次广播的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// 发送队列已满或连接已关闭而被跳过的订阅者
    pub dropped: usize,
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageBroadcaster: Send + Sync {
    async fn broadcast(
        &self,
        group_id: GroupId,
        event: ServerEvent,
    ) -> Result<DeliveryReport, BroadcastError>;
}
