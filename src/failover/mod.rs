//! Failover evaluator
//!
//! Compares realtime queue metrics against per-queue failover rules and owns
//! the activate/deactivate primitives. Deciding *when* to call them belongs
//! to a scheduler, see [`FailoverScheduler`].

mod scheduler;
mod types;

pub use scheduler::{FailoverScheduler, TickReport};
pub use types::*;

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::events::{EventPayload, EventPipeline, EventType};
use crate::registry::{QueueId, Registry};

/// Errors from failover operations
#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("failover config not found: {0}")]
    NotFound(FailoverId),

    #[error("failover config {0} is disabled")]
    Disabled(FailoverId),

    #[error("queue {queue} not found for tenant {tenant}")]
    UnknownQueue { tenant: String, queue: QueueId },
}

impl FailoverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailoverError::NotFound(_) | FailoverError::UnknownQueue { .. } => ErrorKind::NotFound,
            FailoverError::Disabled(_) => ErrorKind::InvalidState,
        }
    }
}

/// Holds failover rules and checks them against live queue metrics.
pub struct FailoverEvaluator {
    configs: DashMap<FailoverId, FailoverConfig>,
    next_id: AtomicU64,
    registry: Arc<Registry>,
    events: Arc<EventPipeline>,
}

impl FailoverEvaluator {
    pub fn new(registry: Arc<Registry>, events: Arc<EventPipeline>) -> Self {
        Self {
            configs: DashMap::new(),
            next_id: AtomicU64::new(1),
            registry,
            events,
        }
    }

    /// Store a new rule. Its queue must exist for the rule's tenant.
    pub fn add_config(&self, config: NewFailoverConfig) -> Result<FailoverConfig, FailoverError> {
        if self.registry.get_queue(&config.tenant, config.queue_id).is_err() {
            return Err(FailoverError::UnknownQueue {
                tenant: config.tenant,
                queue: config.queue_id,
            });
        }

        let id = FailoverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let config = config.into_config(id);
        self.configs.insert(id, config.clone());

        tracing::info!(
            failover_id = %id,
            queue_id = %config.queue_id,
            name = %config.name,
            "Added failover config"
        );
        Ok(config)
    }

    pub fn get_config(&self, id: FailoverId) -> Result<FailoverConfig, FailoverError> {
        self.configs
            .get(&id)
            .map(|c| c.value().clone())
            .ok_or(FailoverError::NotFound(id))
    }

    /// Rules of a tenant, optionally restricted to one queue, ordered by id.
    pub fn list_configs(&self, tenant: &str, queue_id: Option<QueueId>) -> Vec<FailoverConfig> {
        let mut configs: Vec<_> = self
            .configs
            .iter()
            .filter(|c| c.tenant == tenant && queue_id.map_or(true, |q| c.queue_id == q))
            .map(|c| c.value().clone())
            .collect();
        configs.sort_by_key(|c| c.id);
        configs
    }

    /// All rules of one queue regardless of tenant, ordered by id.
    pub fn list_queue_configs(&self, queue_id: QueueId) -> Vec<FailoverConfig> {
        let mut configs: Vec<_> = self
            .configs
            .iter()
            .filter(|c| c.queue_id == queue_id)
            .map(|c| c.value().clone())
            .collect();
        configs.sort_by_key(|c| c.id);
        configs
    }

    pub fn update_config(
        &self,
        id: FailoverId,
        update: FailoverUpdate,
    ) -> Result<FailoverConfig, FailoverError> {
        let mut config = self.configs.get_mut(&id).ok_or(FailoverError::NotFound(id))?;
        update.apply(&mut config);
        Ok(config.clone())
    }

    pub fn remove_config(&self, id: FailoverId) -> Result<FailoverConfig, FailoverError> {
        self.configs
            .remove(&id)
            .map(|(_, c)| c)
            .ok_or(FailoverError::NotFound(id))
    }

    /// Queues that have at least one rule, ordered by id.
    pub fn queues(&self) -> Vec<QueueId> {
        let mut queues: Vec<_> = self.configs.iter().map(|c| c.queue_id).collect();
        queues.sort();
        queues.dedup();
        queues
    }

    /// Rules of `queue_id` whose conditions are violated right now.
    ///
    /// Each enabled rule reports at most its first violated threshold. A queue
    /// without realtime metrics yet reports nothing.
    pub fn check_conditions(&self, queue_id: QueueId) -> Vec<Trigger> {
        let Some(metrics) = self.events.queue_metrics(queue_id) else {
            return Vec::new();
        };

        let mut configs: Vec<_> = self
            .configs
            .iter()
            .filter(|c| c.queue_id == queue_id && c.enabled)
            .map(|c| c.value().clone())
            .collect();
        configs.sort_by_key(|c| c.id);

        configs
            .into_iter()
            .filter_map(|config| {
                config
                    .evaluate(&metrics)
                    .map(|reason| Trigger { config, reason })
            })
            .collect()
    }

    /// Divert traffic for a rule. The rule must be enabled.
    pub fn activate(&self, id: FailoverId) -> Result<FailoverConfig, FailoverError> {
        let config = {
            let mut config = self.configs.get_mut(&id).ok_or(FailoverError::NotFound(id))?;
            if !config.enabled {
                return Err(FailoverError::Disabled(id));
            }
            config.active = true;
            config.last_activation = Some(Utc::now());
            config.clone()
        };

        self.record_transition(&config, "failover_activated");
        Ok(config)
    }

    /// Stop diverting traffic. Always allowed.
    pub fn deactivate(&self, id: FailoverId) -> Result<FailoverConfig, FailoverError> {
        let config = {
            let mut config = self.configs.get_mut(&id).ok_or(FailoverError::NotFound(id))?;
            config.active = false;
            config.last_recovery = Some(Utc::now());
            config.clone()
        };

        self.record_transition(&config, "failover_recovered");
        Ok(config)
    }

    fn record_transition(&self, config: &FailoverConfig, event_name: &'static str) {
        metrics::counter!(
            "distributor_failover_transitions_total",
            "queue" => config.queue_id.to_string(),
            "transition" => event_name
        )
        .increment(1);

        let payload = EventPayload::new()
            .queue(config.queue_id)
            .with("failover_id", config.id.0)
            .with("failover_type", serde_json::to_value(config.failover_type).unwrap_or_default())
            .with("failover_destination", config.failover_destination.clone());

        // The transition already happened; a lost audit event must not undo it.
        if let Err(e) = self
            .events
            .record_event(&config.tenant, EventType::Queue, event_name, payload)
        {
            tracing::warn!(
                failover_id = %config.id,
                event_name,
                error = %e,
                "Failed to record failover event"
            );
        }

        tracing::info!(
            failover_id = %config.id,
            queue_id = %config.queue_id,
            active = config.active,
            destination = %config.failover_destination,
            "{}",
            event_name
        );
    }
}
