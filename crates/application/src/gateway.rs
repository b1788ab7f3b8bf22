//! 网关定位与推送接口
//!
//! 接收者当前连接在哪个网关节点上，由 `GatewayLocator` 决定；
//! 真正的网络推送由 `GatewayClient` 完成。两者都是替换点：
//! 集群化以后定位器改为查询在线路由表，调用方不需要修改。

use std::fmt;

use async_trait::async_trait;
use domain::{PushChatRequest, UserId};
use thiserror::Error;

/// 网关推送路径
pub const CHAT_EVENT_PATH: &str = "chat";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("no gateway for target {0}")]
    NoRoute(UserId),
    #[error("gateway request failed: {0}")]
    Transport(String),
    #[error("gateway rejected push: status {0}")]
    Rejected(u16),
    #[error("gateway push timed out")]
    Timeout,
}

/// 网关节点地址（`host:port`）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewayAddr(String);

impl GatewayAddr {
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{}:{}", host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 网关接收聊天推送的 URL
    pub fn chat_url(&self) -> String {
        format!("http://{}/{}", self.0, CHAT_EVENT_PATH)
    }
}

impl fmt::Display for GatewayAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayLocator: Send + Sync {
    async fn locate(&self, target: UserId) -> Result<GatewayAddr, GatewayError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn push(&self, url: &str, request: &PushChatRequest) -> Result<(), GatewayError>;
}

/// 单网关部署：所有接收者都路由到同一个静态配置的网关
#[derive(Debug, Clone)]
pub struct StaticGatewayLocator {
    addr: GatewayAddr,
}

impl StaticGatewayLocator {
    pub fn new(addr: GatewayAddr) -> Self {
        Self { addr }
    }

    pub fn from_config(gate: &config::GateConfig) -> Self {
        Self::new(GatewayAddr::new(&gate.host, gate.port))
    }
}

#[async_trait]
impl GatewayLocator for StaticGatewayLocator {
    async fn locate(&self, _target: UserId) -> Result<GatewayAddr, GatewayError> {
        Ok(self.addr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_locator_routes_everyone_to_one_gate() {
        let locator = StaticGatewayLocator::new(GatewayAddr::new("10.0.0.7", 8080));
        let a = locator.locate(UserId::generate()).await.unwrap();
        let b = locator.locate(UserId::generate()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.chat_url(), "http://10.0.0.7:8080/chat");
    }
}
