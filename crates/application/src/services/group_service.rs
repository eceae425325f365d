use std::sync::Arc;

use domain::{DomainError, GroupId, GroupName, Membership, NewGroup, RepositoryError, UserId};
use tracing::info;

use crate::{
    clock::Clock,
    dto::{GroupDto, GroupSummaryDto},
    error::ApplicationError,
    repository::{GroupRepository, MembershipRepository},
};

#[derive(Debug, Clone)]
pub struct CreateGroupRequest {
    pub creator_id: UserId,
    pub name: String,
    pub description: Option<String>,
}

pub struct GroupServiceDependencies {
    pub group_repository: Arc<dyn GroupRepository>,
    pub membership_repository: Arc<dyn MembershipRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct GroupService {
    deps: GroupServiceDependencies,
}

impl GroupService {
    pub fn new(deps: GroupServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建群组，创建者在同一个事务里成为第一个成员。
    pub async fn create_group(
        &self,
        request: CreateGroupRequest,
    ) -> Result<GroupDto, ApplicationError> {
        let name = GroupName::parse(request.name)?;
        let group = NewGroup::new(
            name,
            request.description,
            request.creator_id,
            self.deps.clock.now(),
        );

        let stored = self.deps.group_repository.create_with_creator(group).await?;
        info!(group_id = %stored.id, creator_id = %request.creator_id, "group created");
        Ok(GroupDto::from(&stored))
    }

    /// 调用者所在的群组，最新创建的在前。
    pub async fn list_groups(
        &self,
        user_id: UserId,
    ) -> Result<Vec<GroupSummaryDto>, ApplicationError> {
        let groups = self.deps.group_repository.list_for_member(user_id).await?;
        Ok(groups.iter().map(GroupSummaryDto::from).collect())
    }

    pub async fn join_group(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> Result<(), ApplicationError> {
        if self
            .deps
            .group_repository
            .find_by_id(group_id)
            .await?
            .is_none()
        {
            return Err(DomainError::GroupNotFound.into());
        }

        if self
            .deps
            .membership_repository
            .exists(group_id, user_id)
            .await?
        {
            return Err(DomainError::AlreadyGroupMember.into());
        }

        let membership = Membership::new(group_id, user_id, self.deps.clock.now());
        self.deps
            .membership_repository
            .add(membership)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::AlreadyGroupMember),
                other => other.into(),
            })?;

        info!(group_id = %group_id, user_id = %user_id, "user joined group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::Group;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        clock::SystemClock,
        repository::{MockGroupRepository, MockMembershipRepository},
    };

    fn group(id: i64) -> Group {
        let now = Utc::now();
        Group {
            id: GroupId::new(id),
            name: GroupName::parse("rustaceans").unwrap(),
            description: None,
            created_by: Some(UserId::new(1)),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(groups: MockGroupRepository, memberships: MockMembershipRepository) -> GroupService {
        GroupService::new(GroupServiceDependencies {
            group_repository: Arc::new(groups),
            membership_repository: Arc::new(memberships),
            clock: Arc::new(SystemClock),
        })
    }

    #[tokio::test]
    async fn missing_name_is_rejected_before_storage() {
        let err = service(MockGroupRepository::new(), MockMembershipRepository::new())
            .create_group(CreateGroupRequest {
                creator_id: UserId::new(1),
                name: "  ".into(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn create_group_records_the_creator() {
        let mut groups = MockGroupRepository::new();
        groups
            .expect_create_with_creator()
            .withf(|group| group.created_by == UserId::new(1) && group.name.as_str() == "rustaceans")
            .times(1)
            .returning(|_| Ok(group(5)));

        let created = service(groups, MockMembershipRepository::new())
            .create_group(CreateGroupRequest {
                creator_id: UserId::new(1),
                name: " rustaceans ".into(),
                description: Some("all things rust".into()),
            })
            .await
            .unwrap();
        assert_eq!(created.id, GroupId::new(5));
    }

    #[tokio::test]
    async fn joining_a_missing_group_is_not_found() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_id().returning(|_| Ok(None));

        let err = service(groups, MockMembershipRepository::new())
            .join_group(UserId::new(2), GroupId::new(99))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::GroupNotFound)
        ));
    }

    #[tokio::test]
    async fn joining_twice_is_rejected() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_id().returning(|id| Ok(Some(group(id.value()))));
        let mut memberships = MockMembershipRepository::new();
        memberships
            .expect_exists()
            .with(eq(GroupId::new(5)), eq(UserId::new(2)))
            .returning(|_, _| Ok(true));
        memberships.expect_add().never();

        let err = service(groups, memberships)
            .join_group(UserId::new(2), GroupId::new(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::AlreadyGroupMember)
        ));
    }

    #[tokio::test]
    async fn concurrent_join_conflict_maps_to_already_member() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_id().returning(|id| Ok(Some(group(id.value()))));
        let mut memberships = MockMembershipRepository::new();
        memberships.expect_exists().returning(|_, _| Ok(false));
        memberships
            .expect_add()
            .returning(|_| Err(RepositoryError::Conflict));

        let err = service(groups, memberships)
            .join_group(UserId::new(2), GroupId::new(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::AlreadyGroupMember)
        ));
    }
}
