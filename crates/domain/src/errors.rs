//! 领域模型错误定义
//!
//! 区分业务校验错误与存储错误，存储层必须能报告可区分的“不存在”。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参数校验失败
    #[error("参数无效: {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 用户不存在
    #[error("用户不存在")]
    UserNotFound,

    /// 群组不存在
    #[error("群组不存在")]
    GroupNotFound,

    /// 好友关系不存在
    #[error("好友关系不存在")]
    FriendshipNotFound,

    /// 好友关系已存在
    #[error("好友关系已存在")]
    FriendshipExists,

    /// 用户已在群组中
    #[error("用户已在群组中")]
    AlreadyGroupMember,

    /// 用户不在群组中
    #[error("用户不在群组中")]
    NotGroupMember,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("记录不存在")]
    NotFound,
    #[error("记录冲突")]
    Conflict,
    #[error("存储错误: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
