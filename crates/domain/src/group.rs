use crate::value_objects::{GroupId, GroupName, Timestamp, UserId};

/// 待创建的群组，创建者随群组一起成为第一个成员。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: GroupName,
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

impl NewGroup {
    pub fn new(
        name: GroupName,
        description: Option<String>,
        created_by: UserId,
        created_at: Timestamp,
    ) -> Self {
        let description = description
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());
        Self {
            name,
            description,
            created_by,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: GroupName,
    pub description: Option<String>,
    /// 种子数据里的群组可能没有创建者
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// 带成员数量的群组列表项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub group: Group,
    pub member_count: u64,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn blank_description_becomes_none() {
        let name = GroupName::parse("friday").unwrap();
        let group = NewGroup::new(name, Some("   ".into()), UserId::new(1), Utc::now());
        assert_eq!(group.description, None);
    }
}
