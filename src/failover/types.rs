use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::QueueMetrics;
use crate::registry::QueueId;

/// Failover configuration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailoverId(pub u64);

impl std::fmt::Display for FailoverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where diverted traffic goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverType {
    Queue,
    Ivr,
    Voicemail,
}

/// Thresholds, target and status of one failover rule.
///
/// A threshold of `None` or `0` is not configured and never triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig {
    pub id: FailoverId,
    pub tenant: String,
    pub queue_id: QueueId,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,

    /// Callers waiting
    pub max_queue_size: Option<u32>,
    /// Seconds
    pub max_wait_time: Option<u32>,
    /// Percentage
    pub service_level_threshold: Option<u32>,
    /// Minimum available agents
    pub agent_availability_threshold: Option<u32>,

    pub failover_type: FailoverType,
    pub failover_destination: String,

    pub auto_recovery: bool,
    /// Seconds the conditions must stay clear before auto-recovery
    pub recovery_threshold: Option<u32>,

    pub active: bool,
    pub last_activation: Option<DateTime<Utc>>,
    pub last_recovery: Option<DateTime<Utc>>,
}

impl FailoverConfig {
    /// First violated threshold, in the order queue size, wait time, service
    /// level, agent availability.
    pub fn evaluate(&self, metrics: &QueueMetrics) -> Option<FailoverReason> {
        if let Some(max) = configured(self.max_queue_size) {
            if metrics.calls_waiting >= u64::from(max) {
                return Some(FailoverReason::QueueSize {
                    calls_waiting: metrics.calls_waiting,
                    max,
                });
            }
        }
        if let Some(max) = configured(self.max_wait_time) {
            if metrics.longest_wait >= u64::from(max) {
                return Some(FailoverReason::WaitTime {
                    longest_wait: metrics.longest_wait,
                    max,
                });
            }
        }
        if let Some(threshold) = configured(self.service_level_threshold) {
            if metrics.service_level < f64::from(threshold) {
                return Some(FailoverReason::ServiceLevel {
                    service_level: metrics.service_level,
                    threshold,
                });
            }
        }
        if let Some(threshold) = configured(self.agent_availability_threshold) {
            if metrics.agents_available < u64::from(threshold) {
                return Some(FailoverReason::AgentAvailability {
                    agents_available: metrics.agents_available,
                    threshold,
                });
            }
        }
        None
    }
}

fn configured(threshold: Option<u32>) -> Option<u32> {
    threshold.filter(|t| *t > 0)
}

fn default_true() -> bool {
    true
}

/// A failover rule as provisioned, before it gets an id and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewFailoverConfig {
    pub tenant: String,
    pub queue_id: QueueId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub max_queue_size: Option<u32>,
    #[serde(default)]
    pub max_wait_time: Option<u32>,
    #[serde(default)]
    pub service_level_threshold: Option<u32>,
    #[serde(default)]
    pub agent_availability_threshold: Option<u32>,
    pub failover_type: FailoverType,
    pub failover_destination: String,
    #[serde(default = "default_true")]
    pub auto_recovery: bool,
    #[serde(default)]
    pub recovery_threshold: Option<u32>,
}

impl NewFailoverConfig {
    pub fn new(
        tenant: impl Into<String>,
        queue_id: QueueId,
        name: impl Into<String>,
        failover_type: FailoverType,
        failover_destination: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            queue_id,
            name: name.into(),
            description: None,
            enabled: true,
            max_queue_size: None,
            max_wait_time: None,
            service_level_threshold: None,
            agent_availability_threshold: None,
            failover_type,
            failover_destination: failover_destination.into(),
            auto_recovery: true,
            recovery_threshold: None,
        }
    }

    pub(crate) fn into_config(self, id: FailoverId) -> FailoverConfig {
        FailoverConfig {
            id,
            tenant: self.tenant,
            queue_id: self.queue_id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            max_queue_size: self.max_queue_size,
            max_wait_time: self.max_wait_time,
            service_level_threshold: self.service_level_threshold,
            agent_availability_threshold: self.agent_availability_threshold,
            failover_type: self.failover_type,
            failover_destination: self.failover_destination,
            auto_recovery: self.auto_recovery,
            recovery_threshold: self.recovery_threshold,
            active: false,
            last_activation: None,
            last_recovery: None,
        }
    }
}

/// Typed partial update of a failover rule. The `active` flag is not part of
/// it: only activate and deactivate move it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailoverUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub max_queue_size: Option<u32>,
    pub max_wait_time: Option<u32>,
    pub service_level_threshold: Option<u32>,
    pub agent_availability_threshold: Option<u32>,
    pub failover_type: Option<FailoverType>,
    pub failover_destination: Option<String>,
    pub auto_recovery: Option<bool>,
    pub recovery_threshold: Option<u32>,
}

impl FailoverUpdate {
    pub(crate) fn apply(self, config: &mut FailoverConfig) {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(description) = self.description {
            config.description = Some(description);
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(v) = self.max_queue_size {
            config.max_queue_size = Some(v);
        }
        if let Some(v) = self.max_wait_time {
            config.max_wait_time = Some(v);
        }
        if let Some(v) = self.service_level_threshold {
            config.service_level_threshold = Some(v);
        }
        if let Some(v) = self.agent_availability_threshold {
            config.agent_availability_threshold = Some(v);
        }
        if let Some(failover_type) = self.failover_type {
            config.failover_type = failover_type;
        }
        if let Some(destination) = self.failover_destination {
            config.failover_destination = destination;
        }
        if let Some(auto_recovery) = self.auto_recovery {
            config.auto_recovery = auto_recovery;
        }
        if let Some(v) = self.recovery_threshold {
            config.recovery_threshold = Some(v);
        }
    }
}

/// Why a failover rule triggered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum FailoverReason {
    QueueSize { calls_waiting: u64, max: u32 },
    WaitTime { longest_wait: u64, max: u32 },
    ServiceLevel { service_level: f64, threshold: u32 },
    AgentAvailability { agents_available: u64, threshold: u32 },
}

impl std::fmt::Display for FailoverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverReason::QueueSize { calls_waiting, max } => {
                write!(f, "Queue size ({}) exceeds maximum ({})", calls_waiting, max)
            }
            FailoverReason::WaitTime { longest_wait, max } => {
                write!(f, "Wait time ({}s) exceeds maximum ({}s)", longest_wait, max)
            }
            FailoverReason::ServiceLevel {
                service_level,
                threshold,
            } => write!(
                f,
                "Service level ({:.1}%) below threshold ({}%)",
                service_level, threshold
            ),
            FailoverReason::AgentAvailability {
                agents_available,
                threshold,
            } => write!(
                f,
                "Available agents ({}) below threshold ({})",
                agents_available, threshold
            ),
        }
    }
}

/// A rule whose conditions are currently violated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub config: FailoverConfig,
    pub reason: FailoverReason,
}
