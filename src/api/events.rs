//! Event ingestion and the live event feed.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use super::types::{ApiError, EventRequest, RecentQuery, SubscribeQuery};
use crate::api::AppState;
use crate::events::{Channel, Event, Subscription};
use crate::registry::AgentId;

/// POST /v1/events
pub async fn record(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.events.record_event(
        &request.tenant,
        request.event_type,
        &request.event_name,
        request.payload,
    )?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /v1/events?tenant=&limit=
pub async fn recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.events.recent_events(&query.tenant, query.limit)?))
}

/// Most specific filter wins: agent, then queue, then the whole tenant.
pub(crate) fn channel_for(query: &SubscribeQuery) -> Channel {
    if let Some(agent) = &query.agent {
        Channel::Agent(AgentId(agent.clone()))
    } else if let Some(queue) = query.queue {
        Channel::Queue(queue)
    } else {
        Channel::Tenant(query.tenant.clone())
    }
}

/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscribeQuery>,
) -> Response {
    // Subscribe before the upgrade so no event between handshake and first poll is lost.
    let subscription = state
        .events
        .subscribe_tenant(&query.tenant, channel_for(&query));
    ws.on_upgrade(move |socket| handle_socket(socket, subscription))
}

async fn handle_socket(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!(
        tenant = subscription.tenant().unwrap_or_default(),
        channel = %subscription.channel(),
        "Event feed connected"
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(event.as_ref()) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
    tracing::debug!("Event feed disconnected");
}
