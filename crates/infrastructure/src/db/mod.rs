//! PostgreSQL 连接与模式管理。

pub mod repositories;

pub use repositories::{PgMessageRepository, PgRoomRepository, PgUserRepository};

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// 创建 PostgreSQL 连接池。
pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// 启动时保证表结构就绪。
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id          BIGSERIAL PRIMARY KEY,
            name        VARCHAR(255) NOT NULL UNIQUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id          BIGSERIAL PRIMARY KEY,
            username    VARCHAR(150) NOT NULL UNIQUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id            BIGSERIAL PRIMARY KEY,
            room_id       BIGINT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            user_id       BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content       TEXT NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
            status        VARCHAR(20) NOT NULL DEFAULT 'pending',
            is_flagged    BOOLEAN NOT NULL DEFAULT FALSE,
            notes         JSONB NOT NULL DEFAULT '{}'::jsonb,
            moderated_at  TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_room_created ON messages (room_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
