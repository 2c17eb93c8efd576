//! 用户存储的 PostgreSQL 实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{RepositoryError, RepositoryResult, User, UserId, UserRepository, Username};
use sqlx::FromRow;

use crate::db::DbPool;

use super::map_sqlx_error;

#[derive(Debug, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let username = Username::parse(record.username)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        Ok(User::new(UserId::new(record.id), username, record.created_at))
    }
}

pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, username: &Username) -> RepositoryResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username) VALUES ($1) RETURNING id, username, created_at",
        )
        .bind(username.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.try_into()
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.map(User::try_from).transpose()
    }
}
