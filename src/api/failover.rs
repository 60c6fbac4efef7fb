//! Failover endpoints for the scheduler collaborator and operators.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use super::types::{ApiError, FailoverStatus, TenantQuery};
use crate::api::AppState;
use crate::failover::{FailoverConfig, FailoverId};
use crate::registry::QueueId;

/// GET /v1/queues/:id/failover?tenant=
pub async fn queue_status(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<QueueId>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<FailoverStatus>, ApiError> {
    state.registry.get_queue(&query.tenant, queue_id)?;

    Ok(Json(FailoverStatus {
        queue_id,
        configs: state.failover.list_configs(&query.tenant, Some(queue_id)),
        triggers: state.failover.check_conditions(queue_id),
    }))
}

/// POST /v1/failover/:id/activate
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<FailoverId>,
) -> Result<Json<FailoverConfig>, ApiError> {
    Ok(Json(state.failover.activate(id)?))
}

/// POST /v1/failover/:id/deactivate
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<FailoverId>,
) -> Result<Json<FailoverConfig>, ApiError> {
    Ok(Json(state.failover.deactivate(id)?))
}
