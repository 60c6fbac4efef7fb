//! Queue-scoped endpoints: distribution, stats, connect and realtime metrics.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use std::time::Duration;

use super::types::{
    ApiError, ConnectRequest, NextAgentRequest, NextAgentResponse, StatsUpdateRequest, TenantQuery,
};
use crate::api::AppState;
use crate::distribution::ConnectOutcome;
use crate::events::QueueMetrics;
use crate::registry::{Member, MemberId, Queue, QueueId};
use crate::stats::MemberStats;

/// POST /v1/queues/:id/next-agent
pub async fn next_agent(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<QueueId>,
    Json(request): Json<NextAgentRequest>,
) -> Result<Json<NextAgentResponse>, ApiError> {
    let selection = state.distribution.get_next_agent_excluding(
        &request.tenant,
        queue_id,
        &request.call_id,
        &request.exclude,
    )?;

    Ok(Json(NextAgentResponse {
        queue_id,
        call_id: request.call_id,
        selection,
    }))
}

/// POST /v1/queues/:id/connect
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<QueueId>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectOutcome>, ApiError> {
    let connector = state
        .connector
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("call control is not configured"))?;

    let outcome = connector
        .connect(
            &request.tenant,
            queue_id,
            &request.call_id,
            request.ring_timeout_seconds.map(Duration::from_secs),
        )
        .await?;
    Ok(Json(outcome))
}

/// POST /v1/queues/:id/members/:member/stats
pub async fn update_stats(
    State(state): State<Arc<AppState>>,
    Path((queue_id, member_id)): Path<(QueueId, MemberId)>,
    Json(request): Json<StatsUpdateRequest>,
) -> Result<Json<MemberStats>, ApiError> {
    let stats = state
        .distribution
        .update_stats(queue_id, member_id, request.call_duration)?;
    Ok(Json(stats))
}

/// GET /v1/queues/:id/members/:member/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path((queue_id, member_id)): Path<(QueueId, MemberId)>,
) -> Result<Json<MemberStats>, ApiError> {
    Ok(Json(state.distribution.get_stats(queue_id, member_id)?))
}

/// GET /v1/queues/:id/metrics?tenant=
pub async fn queue_metrics(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<QueueId>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<QueueMetrics>, ApiError> {
    state.registry.get_queue(&query.tenant, queue_id)?;
    let metrics = state
        .events
        .queue_metrics(queue_id)
        .unwrap_or_else(|| QueueMetrics::empty(queue_id));
    Ok(Json(metrics))
}

/// DELETE /v1/queues/:id?tenant=
///
/// Drops the queue with its memberships, stats, realtime board and failover
/// rules.
pub async fn remove_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<QueueId>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Queue>, ApiError> {
    let queue = state.distribution.remove_queue(&query.tenant, queue_id)?;
    state.events.forget_queue(queue_id);
    for config in state.failover.list_configs(&query.tenant, Some(queue_id)) {
        state.failover.remove_config(config.id)?;
    }
    Ok(Json(queue))
}

/// DELETE /v1/queues/:id/members/:member?tenant=
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((queue_id, member_id)): Path<(QueueId, MemberId)>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Member>, ApiError> {
    Ok(Json(state.distribution.remove_member(
        &query.tenant,
        queue_id,
        member_id,
    )?))
}
