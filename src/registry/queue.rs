use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::registry::RegistryError;

/// Queue identifier, unique across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub u64);

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distribution strategy configured on a queue.
///
/// The set is closed: a seventh strategy is added here and registered in
/// [`crate::routing::StrategyTable`], never discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Ring every member of the lowest penalty tier at once
    #[default]
    RingAll,
    /// Member idle the longest
    LeastRecent,
    /// Member with the fewest calls taken
    FewestCalls,
    /// Uniform random member
    Random,
    /// Round robin with a persistent per-queue cursor
    #[serde(rename = "rrmemory")]
    RoundRobinMemory,
    /// First member in registration order
    Linear,
}

impl Strategy {
    /// All strategies, in declaration order.
    pub const ALL: [Strategy; 6] = [
        Strategy::RingAll,
        Strategy::LeastRecent,
        Strategy::FewestCalls,
        Strategy::Random,
        Strategy::RoundRobinMemory,
        Strategy::Linear,
    ];

    /// Wire name used in configuration records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RingAll => "ringall",
            Strategy::LeastRecent => "leastrecent",
            Strategy::FewestCalls => "fewestcalls",
            Strategy::Random => "random",
            Strategy::RoundRobinMemory => "rrmemory",
            Strategy::Linear => "linear",
        }
    }
}

impl FromStr for Strategy {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ringall" => Ok(Strategy::RingAll),
            "leastrecent" => Ok(Strategy::LeastRecent),
            "fewestcalls" => Ok(Strategy::FewestCalls),
            "random" => Ok(Strategy::Random),
            "rrmemory" => Ok(Strategy::RoundRobinMemory),
            "linear" => Ok(Strategy::Linear),
            _ => Err(RegistryError::InvalidStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant-scoped call queue.
///
/// Read-only to the distribution core; records are owned by the
/// configuration collaborator and handed over through the [`super::Registry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: QueueId,
    pub tenant: String,
    pub name: String,
    pub strategy: Strategy,
    /// Ring timeout in seconds
    pub timeout: u32,
    /// Maximum time a caller may wait in seconds
    pub max_wait: u32,
    /// Service level threshold in seconds
    pub service_level: u32,
    pub weight: i32,
    /// 0 = unlimited
    pub max_callers: u32,
    /// 0 = unlimited
    pub max_members: u32,
    pub overflow_queue_id: Option<QueueId>,
    /// Seconds before overflowing, 0 = disabled
    pub overflow_timeout: u32,
}

impl Queue {
    /// Create a queue with the defaults of a freshly provisioned record.
    pub fn new(id: QueueId, tenant: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            tenant: tenant.into(),
            name: name.into(),
            strategy: Strategy::default(),
            timeout: 30,
            max_wait: 3600,
            service_level: 20,
            weight: 0,
            max_callers: 0,
            max_members: 0,
            overflow_queue_id: None,
            overflow_timeout: 0,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Whether a new caller may enter given the current waiting count.
    pub fn accepts_caller(&self, calls_waiting: u64) -> bool {
        self.max_callers == 0 || calls_waiting < u64::from(self.max_callers)
    }
}

/// Typed partial update for a queue record.
///
/// Unknown keys are rejected during deserialization instead of being applied
/// blindly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueUpdate {
    pub name: Option<String>,
    pub strategy: Option<Strategy>,
    pub timeout: Option<u32>,
    pub max_wait: Option<u32>,
    pub service_level: Option<u32>,
    pub weight: Option<i32>,
    pub max_callers: Option<u32>,
    pub max_members: Option<u32>,
    pub overflow_timeout: Option<u32>,
}

impl QueueUpdate {
    pub(crate) fn apply(self, queue: &mut Queue) {
        if let Some(name) = self.name {
            queue.name = name;
        }
        if let Some(strategy) = self.strategy {
            queue.strategy = strategy;
        }
        if let Some(timeout) = self.timeout {
            queue.timeout = timeout;
        }
        if let Some(max_wait) = self.max_wait {
            queue.max_wait = max_wait;
        }
        if let Some(service_level) = self.service_level {
            queue.service_level = service_level;
        }
        if let Some(weight) = self.weight {
            queue.weight = weight;
        }
        if let Some(max_callers) = self.max_callers {
            queue.max_callers = max_callers;
        }
        if let Some(max_members) = self.max_members {
            queue.max_members = max_members;
        }
        if let Some(overflow_timeout) = self.overflow_timeout {
            queue.overflow_timeout = overflow_timeout;
        }
    }
}
