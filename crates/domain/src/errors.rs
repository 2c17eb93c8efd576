//! 领域与存储错误定义。

use thiserror::Error;

/// 领域模型错误类型。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// 非法的状态迁移
    #[error("非法的审核状态迁移: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },
}

impl DomainError {
    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_status_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStatusTransition {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// 领域模型结果类型。
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储协作者错误类型。
///
/// `Storage` 是唯一允许向上传播为致命错误的类别，代表协作者故障；
/// `NotFound`/`Conflict` 属于业务上可预期的结果。
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录不存在")]
    NotFound,

    #[error("记录冲突")]
    Conflict,

    #[error("存储错误: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RepositoryError {
    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// 存储结果类型。
pub type RepositoryResult<T> = Result<T, RepositoryError>;
