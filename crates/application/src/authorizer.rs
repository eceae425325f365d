use std::sync::Arc;

use domain::{DomainError, GroupId, UserId};

use crate::{error::ApplicationError, repository::MembershipRepository};

/// 群组消息读写前的成员资格检查。只读，无副作用。
#[derive(Clone)]
pub struct MembershipAuthorizer {
    memberships: Arc<dyn MembershipRepository>,
}

impl MembershipAuthorizer {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    pub async fn is_member(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> Result<bool, ApplicationError> {
        Ok(self.memberships.exists(group_id, user_id).await?)
    }

    pub async fn ensure_member(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> Result<(), ApplicationError> {
        if self.is_member(user_id, group_id).await? {
            Ok(())
        } else {
            Err(DomainError::NotGroupMember.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::repository::MockMembershipRepository;

    #[tokio::test]
    async fn non_member_is_forbidden() {
        let mut memberships = MockMembershipRepository::new();
        memberships
            .expect_exists()
            .with(eq(GroupId::new(1)), eq(UserId::new(2)))
            .returning(|_, _| Ok(false));
        let authorizer = MembershipAuthorizer::new(Arc::new(memberships));

        let err = authorizer
            .ensure_member(UserId::new(2), GroupId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Domain(DomainError::NotGroupMember)
        ));
    }

    #[tokio::test]
    async fn member_passes() {
        let mut memberships = MockMembershipRepository::new();
        memberships.expect_exists().returning(|_, _| Ok(true));
        let authorizer = MembershipAuthorizer::new(Arc::new(memberships));

        assert!(authorizer
            .ensure_member(UserId::new(2), GroupId::new(1))
            .await
            .is_ok());
    }
}
