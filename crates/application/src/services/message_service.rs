use std::sync::Arc;

use domain::{DomainError, GroupId, MessageContent, NewMessage, PageInfo, PageRequest, UserId};
use tracing::{debug, error, info, warn};

use crate::{
    authorizer::MembershipAuthorizer,
    broadcaster::MessageBroadcaster,
    clock::Clock,
    dto::{MessageDto, MessagePageDto},
    error::ApplicationError,
    events::ServerEvent,
    repository::MessageRepository,
};

/// 发送消息请求。`group_id`/`content` 为可选，缺失时返回输入错误。
#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub sender_id: UserId,
    pub group_id: Option<GroupId>,
    pub content: Option<String>,
    /// 缺省为 false，与发送者当前的匿名设置无关
    pub is_anonymous: Option<bool>,
}

pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub authorizer: MembershipAuthorizer,
    pub broadcaster: Arc<dyn MessageBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    /// 校验、鉴权并持久化一条消息，不广播。
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let content = request.content.filter(|content| !content.is_empty());
        let (Some(group_id), Some(content)) = (request.group_id, content) else {
            return Err(DomainError::invalid_argument(
                "message",
                "Group ID and content are required",
            )
            .into());
        };
        // 只含空白的内容同样按无效输入拒绝，不会落库
        let content = MessageContent::new(content)?;

        self.deps
            .authorizer
            .ensure_member(request.sender_id, group_id)
            .await?;

        let message = NewMessage {
            group_id,
            user_id: request.sender_id,
            content,
            is_anonymous: request.is_anonymous.unwrap_or(false),
            created_at: self.deps.clock.now(),
        };
        let stored = self.deps.message_repository.create(message).await?;

        info!(
            message_id = %stored.message.id,
            group_id = %group_id,
            user_id = %request.sender_id,
            "message stored"
        );
        Ok(MessageDto::from(&stored))
    }

    /// 先持久化，成功后再广播。广播失败只记日志，不影响返回结果。
    pub async fn send_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let message = self.create_message(request).await?;
        self.publish(&message).await;
        Ok(message)
    }

    async fn publish(&self, message: &MessageDto) {
        let payload = match serde_json::to_value(message) {
            Ok(payload) => payload,
            Err(err) => {
                error!(message_id = %message.id, error = %err, "failed to encode message for broadcast");
                return;
            }
        };

        let event = ServerEvent::new_message(message.group_id, payload);
        match self.deps.broadcaster.broadcast(message.group_id, event).await {
            Ok(report) => debug!(
                message_id = %message.id,
                group_id = %message.group_id,
                delivered = report.delivered,
                dropped = report.dropped,
                "message broadcast"
            ),
            Err(err) => warn!(
                message_id = %message.id,
                group_id = %message.group_id,
                error = %err,
                "broadcast failed"
            ),
        }
    }

    /// 按页读取历史消息，返回的每页按时间正序排列。
    pub async fn list_messages(
        &self,
        user_id: UserId,
        group_id: GroupId,
        page: PageRequest,
    ) -> Result<MessagePageDto, ApplicationError> {
        self.deps.authorizer.ensure_member(user_id, group_id).await?;

        let repository = &self.deps.message_repository;
        let (records, total) = tokio::try_join!(
            repository.list_recent(group_id, page.limit(), page.offset()),
            repository.count_by_group(group_id),
        )?;

        let messages = records.iter().rev().map(MessageDto::from).collect();
        Ok(MessagePageDto {
            messages,
            pagination: PageInfo::new(page, total),
        })
    }
}
