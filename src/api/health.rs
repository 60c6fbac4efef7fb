//! Health check endpoint handler.

use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub queues: usize,
    pub subscribers: usize,
    pub call_control: bool,
}

/// GET /health
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        queues: state.registry.queue_count(),
        subscribers: state.events.bus().subscriber_count(),
        call_control: state.connector.is_some(),
    })
}
