//! HTTP call-control client against a mock calld, and the connect endpoint
//! wired to it.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{registry_with_queue, TENANT};
use distributor::api::{create_router, AppState};
use distributor::call_control::{CallControl, CallControlError, HttpCallControl};
use distributor::config::DistributorConfig;
use distributor::registry::{AgentId, Strategy};
use distributor::ErrorKind;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_connect_agent_puts_ring_timeout_with_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/calls/call-1/user/alice"))
        .and(header("X-Auth-Token", "secret"))
        .and(body_json(json!({"timeout": 20})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let call_control =
        HttpCallControl::new(mock_server.uri(), reqwest::Client::new()).with_token("secret");

    call_control
        .connect_agent("call-1", &AgentId::from("alice"), Duration::from_secs(20))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upstream_error_is_reported_with_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such call"))
        .mount(&mock_server)
        .await;

    let call_control = HttpCallControl::new(mock_server.uri(), reqwest::Client::new());
    let err = call_control
        .connect_agent("call-9", &AgentId::from("alice"), Duration::from_secs(5))
        .await
        .unwrap_err();

    match &err {
        CallControlError::Upstream { status, message } => {
            assert_eq!(*status, 404);
            assert_eq!(message, "no such call");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let call_control = HttpCallControl::new(mock_server.uri(), reqwest::Client::new())
        .with_request_timeout(Duration::from_millis(100));
    let err = call_control
        .connect_agent("call-1", &AgentId::from("alice"), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, CallControlError::Timeout(100)));
}

#[tokio::test]
async fn test_connect_endpoint_rings_agent_and_reports_no_answer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/calls/call-1/user/alice"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let call_control = HttpCallControl::new(mock_server.uri(), reqwest::Client::new());
    let state = AppState::new(Arc::new(DistributorConfig::default()), registry)
        .with_call_control(Arc::new(call_control));
    let app = create_router(Arc::new(state));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/queues/1/connect")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"tenant": TENANT, "call_id": "call-1", "ring_timeout_seconds": 0}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["connected"], false);
    assert_eq!(body["tried"], json!(["alice"]));
}

#[tokio::test]
async fn test_connect_endpoint_maps_call_control_failure_to_503() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (registry, _) = registry_with_queue(1, Strategy::Linear, &[("alice", 0)]);
    let call_control = HttpCallControl::new(mock_server.uri(), reqwest::Client::new());
    let state = AppState::new(Arc::new(DistributorConfig::default()), registry)
        .with_call_control(Arc::new(call_control));
    let app = create_router(Arc::new(state));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/queues/1/connect")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"tenant": TENANT, "call_id": "call-1"}).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
