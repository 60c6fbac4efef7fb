//! # HTTP surface
//!
//! Thin axum layer over the distribution core.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness and component counts
//! - `GET /metrics` - Prometheus text format
//! - `DELETE /v1/queues/:id?tenant=` - Remove a queue and everything tracked for it
//! - `POST /v1/queues/:id/next-agent` - Pick agent(s) for a call
//! - `POST /v1/queues/:id/connect` - Ring selected agents until one answers (needs call control)
//! - `DELETE /v1/queues/:id/members/:member?tenant=` - Remove a membership
//! - `POST|GET /v1/queues/:id/members/:member/stats` - Post-call stats update and read
//! - `GET /v1/queues/:id/metrics?tenant=` - Realtime queue snapshot
//! - `GET /v1/queues/:id/failover?tenant=` - Rules and current triggers
//! - `POST /v1/failover/:id/activate` and `/deactivate`
//! - `POST /v1/agents/:agent/login`, `/logout`, `/pause`, `/unpause` - Agent presence
//! - `POST /v1/events`, `GET /v1/events?tenant=&limit=` - Record and list lifecycle events
//! - `GET /ws?tenant=&queue=&agent=` - Live event feed of one tenant
//!
//! Errors are `{"error": {"message": ..., "kind": ...}}` with the status
//! derived from the kind: `not_found` 404, `invalid_strategy` and
//! `invalid_state` 400, `unavailable` 503.
//!
//! ## Example
//!
//! ```no_run
//! use distributor::api::{create_router, AppState};
//! use distributor::config::DistributorConfig;
//! use distributor::registry::Registry;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(Registry::new());
//! let config = Arc::new(DistributorConfig::default());
//! let state = Arc::new(AppState::new(config, registry));
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

mod agents;
mod events;
mod failover;
mod health;
mod queues;
pub mod types;

pub use types::*;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::call_control::CallControl;
use crate::config::DistributorConfig;
use crate::distribution::{DistributionService, SequentialConnector};
use crate::events::{EventBus, EventPipeline, MemoryEventStore};
use crate::failover::FailoverEvaluator;
use crate::metrics::MetricsCollector;
use crate::registry::Registry;
use crate::stats::{MemoryStatsStore, StatsStore};

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<DistributorConfig>,
    pub distribution: Arc<DistributionService>,
    pub events: Arc<EventPipeline>,
    pub failover: Arc<FailoverEvaluator>,
    /// Present only when call control is configured
    pub connector: Option<Arc<SequentialConnector>>,
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    /// Wire the core components with in-memory stores sized from `config`.
    pub fn new(config: Arc<DistributorConfig>, registry: Arc<Registry>) -> Self {
        Self::with_stats(config, registry, Arc::new(MemoryStatsStore::new()))
    }

    pub fn with_stats(
        config: Arc<DistributorConfig>,
        registry: Arc<Registry>,
        stats: Arc<dyn StatsStore>,
    ) -> Self {
        let start_time = Instant::now();

        let distribution = Arc::new(
            DistributionService::new(Arc::clone(&registry), stats)
                .with_decision_capacity(config.events.decision_log_capacity),
        );
        let events = Arc::new(EventPipeline::new(
            Arc::clone(&registry),
            Arc::new(MemoryEventStore::new(config.events.event_log_capacity)),
            EventBus::new(config.events.bus_capacity),
        ));
        let failover = Arc::new(FailoverEvaluator::new(
            Arc::clone(&registry),
            Arc::clone(&events),
        ));

        // A recorder may already be installed (tests, repeated construction).
        let prometheus_handle = crate::metrics::setup_metrics().unwrap_or_else(|e| {
            tracing::debug!("Metrics already initialized, creating new handle: {}", e);
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle()
        });
        let metrics_collector = Arc::new(MetricsCollector::new(
            Arc::clone(&registry),
            Arc::clone(&events),
            start_time,
            prometheus_handle,
        ));

        Self {
            registry,
            config,
            distribution,
            events,
            failover,
            connector: None,
            start_time,
            metrics_collector,
        }
    }

    /// Enable the connect endpoint through `call_control`.
    pub fn with_call_control(mut self, call_control: Arc<dyn CallControl>) -> Self {
        let connector = SequentialConnector::new(
            Arc::clone(&self.distribution),
            call_control,
            self.events.bus().clone(),
        )
        .with_ring_timeout(Duration::from_secs(
            self.config.call_control.ring_timeout_seconds,
        ));
        self.connector = Some(Arc::new(connector));
        self
    }
}

/// Create the API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .route("/v1/queues/:id", delete(queues::remove_queue))
        .route("/v1/queues/:id/next-agent", post(queues::next_agent))
        .route("/v1/queues/:id/connect", post(queues::connect))
        .route("/v1/queues/:id/members/:member", delete(queues::remove_member))
        .route(
            "/v1/queues/:id/members/:member/stats",
            post(queues::update_stats).get(queues::get_stats),
        )
        .route("/v1/queues/:id/metrics", get(queues::queue_metrics))
        .route("/v1/queues/:id/failover", get(failover::queue_status))
        .route("/v1/failover/:id/activate", post(failover::activate))
        .route("/v1/failover/:id/deactivate", post(failover::deactivate))
        .route("/v1/agents/:agent/login", post(agents::login))
        .route("/v1/agents/:agent/logout", post(agents::logout))
        .route("/v1/agents/:agent/pause", post(agents::pause))
        .route("/v1/agents/:agent/unpause", post(agents::unpause))
        .route("/v1/events", post(events::record).get(events::recent))
        .route("/ws", get(events::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
