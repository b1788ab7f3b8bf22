//! 网关 HTTP 推送客户端
//!
//! 连接池由 `reqwest::Client` 维护，多个推送任务共享同一个客户端，不携带请求间状态。

use std::time::Duration;

use application::{GatewayClient, GatewayError};
use async_trait::async_trait;
use domain::PushChatRequest;

#[derive(Clone)]
pub struct HttpGatewayClient {
    client: reqwest::Client,
}

impl HttpGatewayClient {
    pub fn new(connect_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn push(&self, url: &str, request: &PushChatRequest) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected(status.as_u16()));
        }
        tracing::debug!(target_uid = %request.target, url, "网关已接收推送");
        Ok(())
    }
}
