//! Periodic failover checks
//!
//! Activates rules whose conditions trigger and auto-recovers active rules
//! once their conditions have stayed clear for `recovery_threshold` seconds.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{FailoverEvaluator, FailoverId};

/// What one scheduler pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub activated: Vec<FailoverId>,
    pub recovered: Vec<FailoverId>,
}

/// Background driver for a [`FailoverEvaluator`].
pub struct FailoverScheduler {
    evaluator: Arc<FailoverEvaluator>,
    interval: Duration,
    /// When each active rule was first seen with clear conditions
    clear_since: Mutex<HashMap<FailoverId, DateTime<Utc>>>,
}

impl FailoverScheduler {
    pub fn new(evaluator: Arc<FailoverEvaluator>, interval: Duration) -> Self {
        Self {
            evaluator,
            interval,
            clear_since: Mutex::new(HashMap::new()),
        }
    }

    /// One evaluation pass over every queue with failover rules.
    pub fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let mut clear_since = self.clear_since.lock();

        for queue_id in self.evaluator.queues() {
            let triggers = self.evaluator.check_conditions(queue_id);
            let triggered: HashSet<FailoverId> = triggers.iter().map(|t| t.config.id).collect();

            for trigger in &triggers {
                clear_since.remove(&trigger.config.id);
                if trigger.config.active {
                    continue;
                }
                tracing::warn!(
                    failover_id = %trigger.config.id,
                    queue_id = %queue_id,
                    reason = %trigger.reason,
                    "Failover conditions triggered"
                );
                match self.evaluator.activate(trigger.config.id) {
                    Ok(_) => report.activated.push(trigger.config.id),
                    Err(e) => tracing::warn!(
                        failover_id = %trigger.config.id,
                        error = %e,
                        "Failed to activate failover"
                    ),
                }
            }

            for config in self.evaluator.list_queue_configs(queue_id) {
                if !config.active || !config.auto_recovery || triggered.contains(&config.id) {
                    continue;
                }
                let since = *clear_since.entry(config.id).or_insert(now);
                let threshold = i64::from(config.recovery_threshold.unwrap_or(0));
                if (now - since).num_seconds() < threshold {
                    continue;
                }
                match self.evaluator.deactivate(config.id) {
                    Ok(_) => {
                        clear_since.remove(&config.id);
                        report.recovered.push(config.id);
                    }
                    Err(e) => tracing::warn!(
                        failover_id = %config.id,
                        error = %e,
                        "Failed to auto-recover failover"
                    ),
                }
            }
        }

        // Forget rules that were deactivated or removed elsewhere.
        clear_since.retain(|id, _| {
            self.evaluator
                .get_config(*id)
                .map(|c| c.active)
                .unwrap_or(false)
        });

        report
    }

    /// Start the scheduler background task.
    /// Returns a JoinHandle that resolves when the scheduler stops.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.interval.as_secs(),
                "Failover scheduler started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Failover scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let report = self.tick(Utc::now());
                        tracing::debug!(
                            activated = report.activated.len(),
                            recovered = report.recovered.len(),
                            "Failover check cycle completed"
                        );
                    }
                }
            }
        })
    }
}
