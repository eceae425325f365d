//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、成员鉴权，
//! 以及对外部适配器（例如密码哈希、消息广播）的抽象。
//! 实时扇出中心 [`FanoutHub`] 也在这一层，它只依赖 tokio 的通道。

pub mod authorizer;
pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod events;
pub mod hub;
pub mod password;
pub mod repository;
pub mod services;

pub use authorizer::MembershipAuthorizer;
pub use broadcaster::{BroadcastError, DeliveryReport, MessageBroadcaster};
pub use clock::{Clock, SystemClock};
pub use dto::{GroupDto, GroupSummaryDto, MessageDto, MessagePageDto, UserDto};
pub use error::ApplicationError;
pub use events::{ClientEvent, GroupMessagePayload, ServerEvent};
pub use hub::{ConnectionGuard, ConnectionId, FanoutHub, Frame, HubStats, Outbox};
pub use password::{PasswordHasher, PasswordHasherError};
pub use repository::{GroupRepository, MembershipRepository, MessageRepository, UserRepository};
pub use services::{
    AuthenticateUserRequest, CreateGroupRequest, CreateMessageRequest, GroupService,
    GroupServiceDependencies, MessageService, MessageServiceDependencies, RegisterUserRequest,
    UserService, UserServiceDependencies,
};
