use std::sync::Arc;

use application::{
    Clock, FanoutHub, GroupService, GroupServiceDependencies, MembershipAuthorizer,
    MessageService, MessageServiceDependencies, SystemClock, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::Infrastructure;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub group_service: Arc<GroupService>,
    pub message_service: Arc<MessageService>,
    pub hub: Arc<FanoutHub>,
    pub jwt_service: Arc<JwtService>,
    /// 每个 WebSocket 连接发送队列的容量
    pub outbox_capacity: usize,
    pub cors_origins: Arc<[String]>,
}

impl AppState {
    /// 用一组适配器装配全部服务，并创建一个空的扇出中心
    pub fn build(infra: Infrastructure, config: &AppConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let hub = Arc::new(FanoutHub::new());
        let authorizer = MembershipAuthorizer::new(infra.membership_repository.clone());

        let user_service = UserService::new(UserServiceDependencies {
            user_repository: infra.user_repository,
            password_hasher: infra.password_hasher,
            clock: clock.clone(),
        });

        let group_service = GroupService::new(GroupServiceDependencies {
            group_repository: infra.group_repository,
            membership_repository: infra.membership_repository,
            clock: clock.clone(),
        });

        let message_service = MessageService::new(MessageServiceDependencies {
            message_repository: infra.message_repository,
            authorizer,
            broadcaster: hub.clone(),
            clock,
        });

        Self {
            user_service: Arc::new(user_service),
            group_service: Arc::new(group_service),
            message_service: Arc::new(message_service),
            hub,
            jwt_service: Arc::new(JwtService::new(config.jwt.clone())),
            outbox_capacity: config.hub.outbox_capacity,
            cors_origins: config.server.cors_origins.clone().into(),
        }
    }
}
