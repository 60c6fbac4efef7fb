//! HTTP surface tests, driven through the router without binding a socket.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{add_queue, app, registry_with_queue, TENANT};
use distributor::failover::{FailoverType, NewFailoverConfig};
use distributor::registry::{QueueId, Registry, Strategy};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_queue_count() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("a", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["queues"], 1);
    assert_eq!(body["call_control"], false);
}

#[tokio::test]
async fn test_next_agent_returns_selection() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("a", 0), ("b", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        post(
            "/v1/queues/1/next-agent",
            json!({"tenant": TENANT, "call_id": "call-1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["call_id"], "call-1");
    assert_eq!(body["selection"]["kind"], "single");
    assert_eq!(body["selection"]["members"]["member"]["agent_id"], "a");
}

#[tokio::test]
async fn test_next_agent_honours_exclusions() {
    let (registry, members) = registry_with_queue(1, Strategy::Linear, &[("a", 0), ("b", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        post(
            "/v1/queues/1/next-agent",
            json!({"tenant": TENANT, "call_id": "call-1", "exclude": [members[0].id]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selection"]["members"]["member"]["agent_id"], "b");
}

#[tokio::test]
async fn test_empty_queue_is_no_agent_not_an_error() {
    let (registry, _) = registry_with_queue(1, Strategy::RingAll, &[]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        post(
            "/v1/queues/1/next-agent",
            json!({"tenant": TENANT, "call_id": "call-1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selection"]["kind"], "no_agent");
}

#[tokio::test]
async fn test_unknown_queue_maps_to_404() {
    let (app, _) = app(Arc::new(Registry::new()));

    let (status, body) = send(
        &app,
        post(
            "/v1/queues/42/next-agent",
            json!({"tenant": TENANT, "call_id": "call-1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_stats_update_and_read_back() {
    let (registry, members) = registry_with_queue(1, Strategy::FewestCalls, &[("a", 0)]);
    let (app, _) = app(registry);
    let uri = format!("/v1/queues/1/members/{}/stats", members[0].id);

    let (status, _) = send(&app, post(&uri, json!({"call_duration": 120}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, post(&uri, json!({"call_duration": 60}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calls_taken"], 2);
    assert_eq!(body["total_talk_time"], 180);
    assert_eq!(body["average_talk_time"], 90.0);
}

#[tokio::test]
async fn test_stats_for_member_of_other_queue_is_404() {
    let registry = Arc::new(Registry::new());
    add_queue(&registry, 1, Strategy::Linear, &[("a", 0)]);
    let members = add_queue(&registry, 2, Strategy::Linear, &[("b", 0)]);
    let (app, _) = app(registry);

    let uri = format!("/v1/queues/1/members/{}/stats", members[0].id);
    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connect_without_call_control_is_503() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("a", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        post(
            "/v1/queues/1/connect",
            json!({"tenant": TENANT, "call_id": "call-1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "unavailable");
}

#[tokio::test]
async fn test_recorded_events_feed_queue_metrics() {
    let (registry, _) = registry_with_queue(1, Strategy::RingAll, &[("a", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        post(
            "/v1/events",
            json!({
                "tenant": TENANT,
                "event_type": "call",
                "event_name": "call_entered",
                "payload": {"queue_id": 1, "call_id": "call-1"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event_name"], "call_entered");

    let (status, body) = send(&app, get(&format!("/v1/queues/1/metrics?tenant={}", TENANT))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calls_waiting"], 1);

    let (status, body) = send(&app, get(&format!("/v1/events?tenant={}&limit=10", TENANT))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_queue_metrics_are_tenant_scoped() {
    let (registry, _) = registry_with_queue(1, Strategy::RingAll, &[]);
    let (app, _) = app(registry);

    let (status, _) = send(&app, get("/v1/queues/1/metrics?tenant=tenant-b")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get(&format!("/v1/queues/1/metrics?tenant={}", TENANT))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service_level"], 100.0);
}

#[tokio::test]
async fn test_unknown_event_type_is_rejected() {
    let (app, _) = app(Arc::new(Registry::new()));

    let (status, _) = send(
        &app,
        post(
            "/v1/events",
            json!({"tenant": TENANT, "event_type": "billing", "event_name": "x"}),
        ),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_failover_activation_round_trip() {
    let (registry, _) = registry_with_queue(1, Strategy::RingAll, &[]);
    let (app, state) = app(registry);
    let added = state
        .failover
        .add_config(NewFailoverConfig::new(
            TENANT,
            QueueId(1),
            "vm",
            FailoverType::Voicemail,
            "support-vm",
        ))
        .unwrap();

    let (status, body) = send(
        &app,
        post(&format!("/v1/failover/{}/activate", added.id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    let (status, body) = send(&app, get(&format!("/v1/queues/1/failover?tenant={}", TENANT))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configs"][0]["active"], true);

    let (status, body) = send(
        &app,
        post(&format!("/v1/failover/{}/deactivate", added.id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, body) = send(&app, post("/v1/failover/99/activate", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_metrics_endpoint_serves_prometheus_text() {
    let (app, _) = app(Arc::new(Registry::new()));

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn next_agent(app: &Router) -> Value {
    let (status, body) = send(
        app,
        post(
            "/v1/queues/1/next-agent",
            json!({"tenant": TENANT, "call_id": "call"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["selection"].clone()
}

#[tokio::test]
async fn test_paused_agent_is_skipped_by_next_agent() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0), ("bob", 0)]);
    let (app, _) = app(registry);

    for agent in ["alice", "bob"] {
        let (status, _) = send(
            &app,
            post(
                &format!("/v1/agents/{}/login", agent),
                json!({"tenant": TENANT, "queue_id": 1}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        post(
            "/v1/agents/alice/pause",
            json!({"tenant": TENANT, "reason": "lunch"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event"]["event_name"], "agent_paused");
    assert_eq!(body["memberships"][0]["paused"], true);
    assert_eq!(body["memberships"][0]["pause_reason"], "lunch");

    assert_eq!(next_agent(&app).await["members"]["member"]["agent_id"], "bob");

    send(&app, post("/v1/agents/alice/unpause", json!({"tenant": TENANT}))).await;
    assert_eq!(next_agent(&app).await["members"]["member"]["agent_id"], "alice");
}

#[tokio::test]
async fn test_logged_out_agent_is_skipped_by_next_agent() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let (app, state) = app(registry);

    let (status, _) = send(&app, post("/v1/agents/alice/logout", json!({"tenant": TENANT}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(state.registry.available_members(QueueId(1)).unwrap().is_empty());
    assert_eq!(next_agent(&app).await["kind"], "no_agent");
}

#[tokio::test]
async fn test_agent_action_outside_tenant_is_404() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let (app, state) = app(registry);

    let (status, body) = send(
        &app,
        post("/v1/agents/alice/pause", json!({"tenant": common::OTHER_TENANT})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(!state.registry.member_for_agent(QueueId(1), &"alice".into()).unwrap().paused);
}

#[tokio::test]
async fn test_event_for_other_tenants_queue_is_404() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let (app, state) = app(registry);

    let (status, _) = send(
        &app,
        post(
            "/v1/events",
            json!({
                "tenant": common::OTHER_TENANT,
                "event_type": "call",
                "event_name": "call_entered",
                "payload": {"queue_id": 1}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(state.events.recent_events(TENANT, 10).unwrap().is_empty());
    assert!(state
        .events
        .recent_events(common::OTHER_TENANT, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_recent_events_require_and_honour_tenant() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let (app, _) = app(registry);

    send(
        &app,
        post(
            "/v1/events",
            json!({
                "tenant": TENANT,
                "event_type": "call",
                "event_name": "call_entered",
                "payload": {"queue_id": 1}
            }),
        ),
    )
    .await;

    let (status, _) = send(&app, get("/v1/events")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        get(&format!("/v1/events?tenant={}", common::OTHER_TENANT)),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (_, body) = send(&app, get(&format!("/v1/events?tenant={}", TENANT))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_removing_queue_drops_its_realtime_state() {
    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let (app, state) = app(registry);

    send(
        &app,
        post(
            "/v1/events",
            json!({
                "tenant": TENANT,
                "event_type": "call",
                "event_name": "call_entered",
                "payload": {"queue_id": 1}
            }),
        ),
    )
    .await;
    assert!(state.events.queue_metrics(QueueId(1)).is_some());

    let (status, _) = send(
        &app,
        delete(&format!("/v1/queues/1?tenant={}", common::OTHER_TENANT)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, delete(&format!("/v1/queues/1?tenant={}", TENANT))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert!(state.events.queue_metrics(QueueId(1)).is_none());
    assert!(state.registry.list_members(QueueId(1)).is_err());
}

#[tokio::test]
async fn test_removed_member_is_no_longer_offered() {
    let (registry, members) = registry_with_queue(1, Strategy::Linear, &[("alice", 0), ("bob", 0)]);
    let (app, _) = app(registry);

    let (status, body) = send(
        &app,
        delete(&format!("/v1/queues/1/members/{}?tenant={}", members[0].id, TENANT)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent_id"], "alice");

    assert_eq!(next_agent(&app).await["members"]["member"]["agent_id"], "bob");
}
