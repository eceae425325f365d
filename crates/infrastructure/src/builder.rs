use std::sync::Arc;

use application::{
    GroupRepository, MembershipRepository, MessageRepository, PasswordHasher, UserRepository,
};
use config::AppConfig;
use thiserror::Error;
use tracing::info;

use crate::{
    memory::InMemoryStorage,
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self::from(&AppConfig::development())
    }
}

impl From<&AppConfig> for InfrastructureConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            database_url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            bcrypt_cost: config.server.bcrypt_cost,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 应用层需要的全部适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub user_repository: Arc<dyn UserRepository>,
    pub group_repository: Arc<dyn GroupRepository>,
    pub membership_repository: Arc<dyn MembershipRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

impl Infrastructure {
    /// 连接 Postgres 并执行迁移
    pub async fn connect(config: &InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(&config.database_url, config.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        info!(max_connections = config.max_connections, "database ready");

        let storage = PgStorage::new(pool);
        Ok(Self {
            user_repository: storage.user_repository,
            group_repository: storage.group_repository,
            membership_repository: storage.membership_repository,
            message_repository: storage.message_repository,
            password_hasher: Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)),
        })
    }

    pub fn in_memory(bcrypt_cost: Option<u32>) -> Self {
        let storage = InMemoryStorage::new();
        Self {
            user_repository: Arc::new(storage.clone()),
            group_repository: Arc::new(storage.clone()),
            membership_repository: Arc::new(storage.clone()),
            message_repository: Arc::new(storage),
            password_hasher: Arc::new(BcryptPasswordHasher::new(bcrypt_cost)),
        }
    }
}
