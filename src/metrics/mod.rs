//! # Metrics
//!
//! Prometheus export of the distribution core.
//!
//! **Counters:**
//! - `distributor_distributions_total{queue, strategy, outcome}` - Strategy decisions
//! - `distributor_events_total{event_type, event_name}` - Recorded lifecycle events
//! - `distributor_failover_transitions_total{queue, transition}` - Failover activations and recoveries
//!
//! **Histograms:**
//! - `distributor_call_duration_seconds{queue}` - Talk time reported through `update_stats`
//!
//! **Gauges** (refreshed on every scrape):
//! - `distributor_queues_total` - Registered queues
//! - `distributor_calls_waiting{queue, tenant}`
//! - `distributor_longest_wait_seconds{queue, tenant}`
//! - `distributor_service_level_percent{queue, tenant}`
//! - `distributor_agents_logged{queue, tenant}`
//! - `distributor_agents_available{queue, tenant}`
//! - `distributor_agents_on_call{queue, tenant}`
//! - `distributor_agents_paused{queue, tenant}`

pub mod handler;

use std::sync::Arc;
use std::time::Instant;

use crate::events::{EventPipeline, QueueMetrics};
use crate::registry::Registry;

/// Computes gauges from live state and renders the Prometheus text.
pub struct MetricsCollector {
    registry: Arc<Registry>,
    events: Arc<EventPipeline>,
    start_time: Instant,
    prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        registry: Arc<Registry>,
        events: Arc<EventPipeline>,
        start_time: Instant,
        prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        Self {
            registry,
            events,
            start_time,
            prometheus_handle,
        }
    }

    /// Refresh the per-queue gauges.
    ///
    /// Queues that have not seen an event yet report an empty board.
    pub fn update_queue_gauges(&self) {
        let queues = self.registry.all_queues();
        metrics::gauge!("distributor_queues_total").set(queues.len() as f64);

        for queue in queues {
            let snapshot = self
                .events
                .queue_metrics(queue.id)
                .unwrap_or_else(|| QueueMetrics::empty(queue.id));
            let labels = [
                ("queue", queue.id.to_string()),
                ("tenant", queue.tenant.clone()),
            ];

            metrics::gauge!("distributor_calls_waiting", &labels).set(snapshot.calls_waiting as f64);
            metrics::gauge!("distributor_longest_wait_seconds", &labels)
                .set(snapshot.longest_wait as f64);
            metrics::gauge!("distributor_service_level_percent", &labels)
                .set(snapshot.service_level);
            metrics::gauge!("distributor_agents_logged", &labels).set(snapshot.agents_logged as f64);
            metrics::gauge!("distributor_agents_available", &labels)
                .set(snapshot.agents_available as f64);
            metrics::gauge!("distributor_agents_on_call", &labels)
                .set(snapshot.agents_on_call as f64);
            metrics::gauge!("distributor_agents_paused", &labels).set(snapshot.agents_paused as f64);
        }

        tracing::trace!("Refreshed queue gauges");
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// Talk-time buckets run from 10 seconds to one hour.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let talk_buckets = &[
        10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("distributor_call_duration_seconds".to_string()),
            talk_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
