use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("room not found")]
    RoomNotFound,
    #[error("message not found")]
    MessageNotFound,
}

impl ApplicationError {
    /// 存储连通性故障是唯一允许向上传播为致命错误的类别。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApplicationError::Repository(RepositoryError::Storage { .. })
        )
    }
}
