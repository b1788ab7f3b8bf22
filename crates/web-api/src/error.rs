use application::{ApplicationError, LoadError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

/// 业务响应码，HTTP 状态码恒为 200
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    InvalidInput,
    TokenInvalid,
    NotFound,
    Internal,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvalidInput => 1001,
            Self::TokenInvalid => 1002,
            Self::NotFound => 1003,
            Self::Internal => 1004,
        }
    }
}

/// 所有接口统一的 `{code, message, data}` 信封
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

/// 成功响应
#[derive(Debug)]
pub struct ApiResponse<T>(pub T);

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            code: ResponseCode::Success.code(),
            message: "success".to_string(),
            data: Some(self.0),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    code: ResponseCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::InvalidInput, message)
    }

    pub fn token_invalid() -> Self {
        Self::new(ResponseCode::TokenInvalid, "token invalid")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::NotFound, message)
    }

    /// 内部错误不向调用方暴露细节
    pub fn internal() -> Self {
        Self::new(ResponseCode::Internal, "internal error")
    }

    pub fn code(&self) -> ResponseCode {
        self.code
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "请求体解析失败");
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::invalid_input(errors.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidArgument { .. }
            | DomainError::FriendshipExists
            | DomainError::AlreadyGroupMember
            | DomainError::NotGroupMember => ApiError::invalid_input(error.to_string()),
            DomainError::UserNotFound
            | DomainError::GroupNotFound
            | DomainError::FriendshipNotFound => ApiError::not_found(error.to_string()),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(error: LoadError) -> Self {
        // 加载是全有或全无：任何子任务失败都只返回通用内部错误
        tracing::warn!(error = %error, "会话数据加载失败");
        ApiError::internal()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => err.into(),
            ApplicationError::Repository(RepositoryError::NotFound) => {
                ApiError::not_found("resource not found")
            }
            ApplicationError::Repository(RepositoryError::Conflict) => {
                ApiError::invalid_input("resource already exists")
            }
            ApplicationError::Authentication => ApiError::token_invalid(),
            ApplicationError::Load(err) => err.into(),
            other => {
                tracing::error!(error = %other, "请求处理失败");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            code: self.code.code(),
            message: self.message,
            data: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_codes() {
        let cases = [
            (DomainError::invalid_argument("account", "empty"), 1001),
            (DomainError::FriendshipExists, 1001),
            (DomainError::NotGroupMember, 1001),
            (DomainError::UserNotFound, 1003),
            (DomainError::FriendshipNotFound, 1003),
        ];
        for (error, code) in cases {
            assert_eq!(ApiError::from(error).code().code(), code);
        }
    }

    #[test]
    fn store_failures_are_generic_internal_errors() {
        let error = ApiError::from(ApplicationError::Repository(RepositoryError::storage(
            "connection reset by peer",
        )));
        assert_eq!(error.code(), ResponseCode::Internal);
        assert_eq!(error.to_string(), "internal error");
    }

    #[test]
    fn every_load_failure_is_internal() {
        let error = ApiError::from(ApplicationError::Load(LoadError::UserNotFound(
            domain::UserId::generate(),
        )));
        assert_eq!(error.code(), ResponseCode::Internal);
        assert_eq!(
            ApiError::from(ApplicationError::Authentication).code(),
            ResponseCode::TokenInvalid
        );
    }
}
