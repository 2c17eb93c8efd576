//! 存储协作者接口的 PostgreSQL 实现。

mod message_repository_impl;
mod room_repository_impl;
mod user_repository_impl;

pub use message_repository_impl::PgMessageRepository;
pub use room_repository_impl::PgRoomRepository;
pub use user_repository_impl::PgUserRepository;

use domain::RepositoryError;

/// 把 sqlx 错误折叠成存储协作者错误；唯一约束冲突单独归类。
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage_with_source("数据库操作失败", err)
}
