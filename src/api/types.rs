//! Request, response and error bodies of the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::distribution::DistributionError;
use crate::error::ErrorKind;
use crate::events::{Event, EventError, EventPayload, EventType};
use crate::failover::{FailoverConfig, FailoverError, Trigger};
use crate::registry::{Member, MemberId, QueueId, RegistryError};
use crate::routing::Selection;

/// Query string carrying the tenant a lookup is scoped to.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantQuery {
    pub tenant: String,
}

/// `POST /v1/queues/:id/next-agent`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NextAgentRequest {
    pub tenant: String,
    pub call_id: String,
    /// Members already offered this call
    #[serde(default)]
    pub exclude: Vec<MemberId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextAgentResponse {
    pub queue_id: QueueId,
    pub call_id: String,
    pub selection: Selection,
}

/// `POST /v1/queues/:id/members/:member/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsUpdateRequest {
    /// Talk time in seconds
    pub call_duration: u64,
}

/// `POST /v1/queues/:id/connect`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectRequest {
    pub tenant: String,
    pub call_id: String,
    #[serde(default)]
    pub ring_timeout_seconds: Option<u64>,
}

/// `POST /v1/events`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventRequest {
    pub tenant: String,
    pub event_type: EventType,
    pub event_name: String,
    #[serde(default)]
    pub payload: EventPayload,
}

/// `GET /v1/queues/:id/failover`
#[derive(Debug, Clone, Serialize)]
pub struct FailoverStatus {
    pub queue_id: QueueId,
    pub configs: Vec<FailoverConfig>,
    pub triggers: Vec<Trigger>,
}

/// Query of `GET /ws`. Only the tenant's events are delivered; within it the
/// most specific filter given wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeQuery {
    pub tenant: String,
    pub queue: Option<QueueId>,
    pub agent: Option<String>,
}

/// Query of `GET /v1/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentQuery {
    pub tenant: String,
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    100
}

/// `POST /v1/agents/:agent/{login,logout,pause,unpause}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentActionRequest {
    pub tenant: String,
    /// Restrict the action to one queue; every membership otherwise
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    /// Pause reason
    #[serde(default)]
    pub reason: Option<String>,
}

/// The recorded event and the agent's memberships after it was applied.
#[derive(Debug, Clone, Serialize)]
pub struct AgentActionResponse {
    pub event: Event,
    pub memberships: Vec<Member>,
}

/// Error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub kind: ErrorKind,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                kind,
            },
        }
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidStrategy | ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<DistributionError> for ApiError {
    fn from(e: DistributionError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<EventError> for ApiError {
    fn from(e: EventError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<FailoverError> for ApiError {
    fn from(e: FailoverError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}
