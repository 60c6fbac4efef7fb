//! HTTP call-control client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{CallControl, CallControlError};
use crate::config::CallControlConfig;
use crate::registry::AgentId;

#[derive(Serialize)]
struct ConnectRequest {
    timeout: u64,
}

/// Talks to a calld-style REST API:
/// `PUT {base_url}/calls/{call_id}/user/{agent_id}`.
pub struct HttpCallControl {
    base_url: String,
    token: Option<String>,
    request_timeout: Duration,
    client: Client,
}

impl HttpCallControl {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            request_timeout: Duration::from_secs(5),
            client,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build a client from configuration, reading the token from the
    /// configured environment variable.
    pub fn from_config(config: &CallControlConfig) -> Result<Self, CallControlError> {
        let client = Client::builder()
            .build()
            .map_err(|e| CallControlError::Configuration(e.to_string()))?;

        let mut call_control = Self::new(config.base_url.clone(), client)
            .with_request_timeout(Duration::from_secs(config.request_timeout_seconds));

        if let Some(ref var) = config.token_env {
            let token = std::env::var(var).map_err(|_| {
                CallControlError::Configuration(format!("environment variable {} is not set", var))
            })?;
            call_control = call_control.with_token(token);
        }
        Ok(call_control)
    }
}

#[async_trait]
impl CallControl for HttpCallControl {
    async fn connect_agent(
        &self,
        call_id: &str,
        agent_id: &AgentId,
        ring_timeout: Duration,
    ) -> Result<(), CallControlError> {
        let url = format!("{}/calls/{}/user/{}", self.base_url, call_id, agent_id);

        let mut request = self
            .client
            .put(&url)
            .timeout(self.request_timeout)
            .json(&ConnectRequest {
                timeout: ring_timeout.as_secs(),
            });
        if let Some(ref token) = self.token {
            request = request.header("X-Auth-Token", token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CallControlError::Timeout(self.request_timeout.as_millis() as u64)
            } else {
                CallControlError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CallControlError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(call_id, agent_id = %agent_id, "Call control accepted connect request");
        Ok(())
    }
}
