//! 基础设施层。
//!
//! 消息存储协作者的两个后端：进程内内存实现（默认后端，也是测试替身）
//! 与 PostgreSQL 实现（sqlx，审核记录存 JSONB），外加保留期清理任务。

pub mod db;
pub mod memory;
pub mod retention;

pub use db::{
    create_pg_pool, ensure_schema, DbPool, PgMessageRepository, PgRoomRepository, PgUserRepository,
};
pub use memory::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository};
pub use retention::RetentionSweeper;
