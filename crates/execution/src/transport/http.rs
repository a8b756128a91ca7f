use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{JsonRpcRequest, JsonRpcResponse, Transport};
use crate::{engine_api::jwt::JwtProvider, error::EngineError};

/// Per-attempt bound; the retry loops own the overall deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpTransport {
    client: Client,
    url: Url,
    jwt_provider: Option<JwtProvider>,
}

impl HttpTransport {
    pub fn new(url: Url) -> Result<Self, EngineError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self { client, url, jwt_provider: None })
    }

    pub fn with_jwt(mut self, secret: [u8; 32], jwt_id: Option<String>) -> Self {
        self.jwt_provider = Some(JwtProvider::new(secret, jwt_id));
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, EngineError> {
        let mut req_builder = self.client.post(self.url.clone()).json(req);
        if let Some(provider) = &self.jwt_provider {
            // A fresh token per request keeps the `iat` claim inside the
            // EL's clock-skew window.
            req_builder = req_builder.bearer_auth(provider.token()?);
        }

        let resp =
            req_builder.send().await.map_err(|e| EngineError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Transport(format!("status code: {status}")));
        }

        let body = resp.bytes().await.map_err(|e| EngineError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}
