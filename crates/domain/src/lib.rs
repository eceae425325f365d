//! 群聊系统核心领域模型
//!
//! 包含用户、群组、成员关系、消息等核心实体，以及分页规则。

pub mod errors;
pub mod group;
pub mod membership;
pub mod message;
pub mod pagination;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use group::{Group, GroupSummary, NewGroup};
pub use membership::Membership;
pub use message::{Message, MessageWithSender, NewMessage, ANONYMOUS_DISPLAY_NAME};
pub use pagination::{PageInfo, PageRequest};
pub use user::{NewUser, User};
pub use value_objects::*;
