//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP 请求委托给应用层的用例服务，
//! 所有响应都包装为 `{code, message, data}` 信封。

mod auth;
mod error;
mod extract;
mod routes;
mod state;

pub use auth::{Claims, JwtService};
pub use config::JwtConfig;
pub use error::{ApiError, ApiResponse, Envelope, ResponseCode};
pub use routes::router;
pub use state::AppState;
