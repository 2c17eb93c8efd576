//! 房间存储的 PostgreSQL 实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{RepositoryError, RepositoryResult, Room, RoomId, RoomRepository};
use sqlx::FromRow;

use crate::db::DbPool;

use super::map_sqlx_error;

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoomRecord> for Room {
    type Error = RepositoryError;

    fn try_from(record: RoomRecord) -> Result<Self, Self::Error> {
        Room::new(RoomId::new(record.id), record.name, record.created_at)
            .map_err(|err| RepositoryError::storage(err.to_string()))
    }
}

pub struct PgRoomRepository {
    pool: DbPool,
}

impl PgRoomRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create(&self, name: &str) -> RepositoryResult<Room> {
        let record = sqlx::query_as::<_, RoomRecord>(
            "INSERT INTO rooms (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.try_into()
    }

    async fn find_by_id(&self, id: RoomId) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, created_at FROM rooms WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.map(Room::try_from).transpose()
    }

    async fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, created_at FROM rooms WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.map(Room::try_from).transpose()
    }

    async fn list_all(&self) -> RepositoryResult<Vec<Room>> {
        let records = sqlx::query_as::<_, RoomRecord>(
            "SELECT id, name, created_at FROM rooms ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        records.into_iter().map(Room::try_from).collect()
    }

    async fn delete(&self, id: RoomId) -> RepositoryResult<()> {
        // 消息经由外键 ON DELETE CASCADE 一并删除
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
