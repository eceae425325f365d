mod group_service;
mod message_service;
mod user_service;

pub use group_service::{CreateGroupRequest, GroupService, GroupServiceDependencies};
pub use message_service::{CreateMessageRequest, MessageService, MessageServiceDependencies};
pub use user_service::{
    AuthenticateUserRequest, RegisterUserRequest, UserService, UserServiceDependencies,
    MIN_PASSWORD_LEN,
};
