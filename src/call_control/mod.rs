//! Call-control collaborator.
//!
//! The distribution core never rings phones itself. It asks a [`CallControl`]
//! implementation to connect a waiting call to an agent and learns the outcome
//! from `call_answered` events.

mod http;

pub use http::HttpCallControl;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::registry::AgentId;

/// Errors from the call-control collaborator.
#[derive(Error, Debug)]
pub enum CallControlError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Collaborator returned an error response (4xx, 5xx).
    #[error("Call control error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Client misconfiguration, e.g. a missing token.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CallControlError {
    /// Every collaborator failure is retried by the caller, never inside the core.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Unavailable
    }
}

/// Connects waiting calls to agents.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Start ringing `agent_id` for `call_id`. Returns once the request is
    /// accepted; the answer arrives later as an event.
    async fn connect_agent(
        &self,
        call_id: &str,
        agent_id: &AgentId,
        ring_timeout: Duration,
    ) -> Result<(), CallControlError>;
}
