use axum::extract::FromRequest;

use crate::error::ApiError;

/// 与 `axum::Json` 相同，但解析失败时返回 1001 信封
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);
