//! Agent presence actions.
//!
//! Each action is recorded as an agent event, so the realtime counters, the
//! feed and the queue memberships all move through the same pipeline.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::types::{AgentActionRequest, AgentActionResponse, ApiError};
use crate::api::AppState;
use crate::error::ErrorKind;
use crate::events::{EventPayload, EventType, KnownEvent};
use crate::registry::{AgentId, Member, QueueId};

/// POST /v1/agents/:agent/login
pub async fn login(
    state: State<Arc<AppState>>,
    agent: Path<String>,
    request: Json<AgentActionRequest>,
) -> Result<(StatusCode, Json<AgentActionResponse>), ApiError> {
    act(state, agent, request, KnownEvent::AgentLogin)
}

/// POST /v1/agents/:agent/logout
pub async fn logout(
    state: State<Arc<AppState>>,
    agent: Path<String>,
    request: Json<AgentActionRequest>,
) -> Result<(StatusCode, Json<AgentActionResponse>), ApiError> {
    act(state, agent, request, KnownEvent::AgentLogout)
}

/// POST /v1/agents/:agent/pause
pub async fn pause(
    state: State<Arc<AppState>>,
    agent: Path<String>,
    request: Json<AgentActionRequest>,
) -> Result<(StatusCode, Json<AgentActionResponse>), ApiError> {
    act(state, agent, request, KnownEvent::AgentPaused)
}

/// POST /v1/agents/:agent/unpause
pub async fn unpause(
    state: State<Arc<AppState>>,
    agent: Path<String>,
    request: Json<AgentActionRequest>,
) -> Result<(StatusCode, Json<AgentActionResponse>), ApiError> {
    act(state, agent, request, KnownEvent::AgentUnpaused)
}

fn act(
    State(state): State<Arc<AppState>>,
    Path(agent): Path<String>,
    Json(request): Json<AgentActionRequest>,
    action: KnownEvent,
) -> Result<(StatusCode, Json<AgentActionResponse>), ApiError> {
    let agent_id = AgentId(agent);
    let queues = affected_queues(&state, &request, &agent_id)?;

    let mut payload = EventPayload::new().agent(agent_id.clone());
    if let Some(queue_id) = request.queue_id {
        payload = payload.queue(queue_id);
    }
    if let Some(reason) = request.reason {
        payload = payload.with("reason", reason);
    }

    let event = state
        .events
        .record_event(&request.tenant, EventType::Agent, action.as_str(), payload)?;

    let memberships = queues
        .into_iter()
        .filter_map(|queue_id| state.registry.member_for_agent(queue_id, &agent_id).ok())
        .collect::<Vec<Member>>();
    Ok((
        StatusCode::CREATED,
        Json(AgentActionResponse { event, memberships }),
    ))
}

/// Queues the action applies to. An agent with no membership in scope is
/// reported as not found.
fn affected_queues(
    state: &AppState,
    request: &AgentActionRequest,
    agent_id: &AgentId,
) -> Result<Vec<QueueId>, ApiError> {
    match request.queue_id {
        Some(queue_id) => {
            state.registry.get_queue(&request.tenant, queue_id)?;
            state.registry.member_for_agent(queue_id, agent_id)?;
            Ok(vec![queue_id])
        }
        None => {
            let queues = state.registry.queues_for_agent(&request.tenant, agent_id);
            if queues.is_empty() {
                return Err(ApiError::new(
                    ErrorKind::NotFound,
                    format!("agent {} has no queue membership", agent_id),
                ));
            }
            Ok(queues)
        }
    }
}
