//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{ModelError, QuotaError, RepositoryError};
use crate::application::workflows::LoopAbort;
use crate::domain::outline::OutlineError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 请求参数错误（在配额检查和模型调用之前拒绝）
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 配额不足
    #[error(transparent)]
    QuotaExceeded(#[from] QuotaError),

    /// 模型调用失败
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Editor/Critic 循环中途失败，保留已完成的迭代历史
    #[error("Editor-critic loop aborted at iteration {}: {}", .0.iteration, .0.cause)]
    LoopAborted(Box<LoopAbort>),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 底层模型错误（循环中断时取其原因）
    pub fn model_error(&self) -> Option<&ModelError> {
        match self {
            Self::Model(e) => Some(e),
            Self::LoopAborted(abort) => Some(&abort.cause),
            _ => None,
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound {
                resource_type: "Entity",
                id,
            },
            other => Self::RepositoryError(other.to_string()),
        }
    }
}

impl From<OutlineError> for ApplicationError {
    fn from(err: OutlineError) -> Self {
        match err {
            OutlineError::ChapterNotFound(number) => Self::not_found("Chapter", number),
            other => Self::ValidationError(other.to_string()),
        }
    }
}

impl From<LoopAbort> for ApplicationError {
    fn from(abort: LoopAbort) -> Self {
        Self::LoopAborted(Box::new(abort))
    }
}
