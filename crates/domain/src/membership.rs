use crate::value_objects::{GroupId, Timestamp, UserId};

/// 用户与群组的成员关系，(group_id, user_id) 唯一。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub joined_at: Timestamp,
}

impl Membership {
    pub fn new(group_id: GroupId, user_id: UserId, joined_at: Timestamp) -> Self {
        Self {
            group_id,
            user_id,
            joined_at,
        }
    }
}
