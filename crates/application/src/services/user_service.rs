use std::sync::Arc;

use domain::{DomainError, NewUser, RepositoryError, UserEmail, UserId, Username};
use tracing::info;

use crate::{
    clock::Clock, dto::UserDto, error::ApplicationError, password::PasswordHasher,
    repository::UserRepository,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<UserDto, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::invalid_argument(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            )
            .into());
        }

        if self
            .deps
            .user_repository
            .find_by_email(email.clone())
            .await?
            .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        let password = self.deps.password_hasher.hash(&request.password).await?;
        let new_user = NewUser {
            username,
            email,
            password,
            created_at: self.deps.clock.now(),
        };

        // 唯一约束兜底并发注册
        let stored = self
            .deps
            .user_repository
            .create(new_user)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::from(DomainError::UserAlreadyExists),
                other => other.into(),
            })?;

        info!(user_id = %stored.id, "user registered");
        Ok(UserDto::from(&stored))
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<UserDto, ApplicationError> {
        let email = UserEmail::parse(request.email).map_err(|_| ApplicationError::Authentication)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::Authentication);
        }

        Ok(UserDto::from(&user))
    }

    pub async fn profile(&self, user_id: UserId) -> Result<UserDto, ApplicationError> {
        let user = self
            .deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        Ok(UserDto::from(&user))
    }

    /// 只影响之后发送的消息，已有消息的展示不变。
    pub async fn set_anonymous_mode(
        &self,
        user_id: UserId,
        is_anonymous: bool,
    ) -> Result<bool, ApplicationError> {
        let now = self.deps.clock.now();
        let user = self
            .deps
            .user_repository
            .set_anonymous(user_id, is_anonymous, now)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => ApplicationError::from(DomainError::UserNotFound),
                other => other.into(),
            })?;
        Ok(user.is_anonymous)
    }
}
