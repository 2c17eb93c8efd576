//! 消息存储的 PostgreSQL 实现。
//!
//! 审核记录整体存进 JSONB 列；状态与派生标记冗余成独立列，供计数
//! 查询与管理端过滤直接使用。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Message, MessageFilter, MessageId, MessageRepository, ModerationNotes, ModerationStatus,
    RepositoryError, RepositoryResult, RoomId, Timestamp, UserId,
};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::db::DbPool;

use super::map_sqlx_error;

const MESSAGE_COLUMNS: &str =
    "id, room_id, user_id, content, created_at, status, is_flagged, notes, moderated_at";

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    room_id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    status: String,
    is_flagged: bool,
    notes: Json<ModerationNotes>,
    moderated_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let status = ModerationStatus::parse(&record.status)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        Ok(Message {
            id: MessageId::new(record.id),
            room_id: RoomId::new(record.room_id),
            user_id: UserId::new(record.user_id),
            content: record.content,
            created_at: record.created_at,
            status,
            is_flagged: record.is_flagged,
            notes: record.notes.0,
            moderated_at: record.moderated_at,
        })
    }
}

pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: &str,
    ) -> RepositoryResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO messages (room_id, user_id, content) VALUES ($1, $2, $3) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(room_id.0)
        .bind(user_id.0)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.try_into()
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        record.map(Message::try_from).transpose()
    }

    async fn update_moderation(
        &self,
        id: MessageId,
        status: ModerationStatus,
        notes: &ModerationNotes,
        moderated_at: Timestamp,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET status = $2, is_flagged = $3, notes = $4, moderated_at = $5 \
             WHERE id = $1",
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(status.is_flagged())
        .bind(Json(notes))
        .bind(moderated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_readable(&self, room_id: RoomId, limit: u32) -> RepositoryResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE room_id = $1 AND status NOT IN ('pending', 'flagged') \
             ORDER BY created_at, id LIMIT $2"
        ))
        .bind(room_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        records.into_iter().map(Message::try_from).collect()
    }

    async fn count(&self, room_id: RoomId, filter: &MessageFilter) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE room_id = $1 \
               AND ($2::timestamptz IS NULL OR created_at >= $2) \
               AND ($3::varchar IS NULL OR status = $3) \
               AND (NOT $4 OR is_flagged)",
        )
        .bind(room_id.0)
        .bind(filter.created_after)
        .bind(filter.status.map(ModerationStatus::as_str))
        .bind(filter.flagged_only)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn count_distinct_senders(
        &self,
        room_id: RoomId,
        since: Timestamp,
    ) -> RepositoryResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user_id) FROM messages \
             WHERE room_id = $1 AND created_at >= $2",
        )
        .bind(room_id.0)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn sentiment_polarities(&self, room_id: RoomId) -> RepositoryResult<Vec<f64>> {
        let polarities: Vec<f64> = sqlx::query_scalar(
            "SELECT (notes->'sentiment'->>'polarity')::float8 FROM messages \
             WHERE room_id = $1 AND notes->'sentiment' IS NOT NULL",
        )
        .bind(room_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(polarities)
    }

    async fn delete_created_before(&self, cutoff: Timestamp) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
