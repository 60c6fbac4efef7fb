//! Queue and member provisioning
//!
//! Queues listed in the config file are loaded into the registry at startup.
//!
//! ```toml
//! [[queues]]
//! id = 1
//! tenant = "acme"
//! name = "support"
//! strategy = "rrmemory"
//!
//! [[queues.members]]
//! agent_id = "alice"
//! penalty = 0
//! ```

use serde::{Deserialize, Serialize};

use crate::registry::{Queue, QueueId, Strategy};

use super::ConfigError;

/// One `[[queues]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    pub id: u64,
    pub tenant: String,
    pub name: String,
    /// Kept as text so an unknown name is reported with its queue
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default = "default_max_wait")]
    pub max_wait: u32,
    #[serde(default = "default_service_level")]
    pub service_level: u32,
    #[serde(default)]
    pub weight: i32,
    #[serde(default)]
    pub max_callers: u32,
    #[serde(default)]
    pub max_members: u32,
    #[serde(default)]
    pub overflow_queue_id: Option<u64>,
    #[serde(default)]
    pub overflow_timeout: u32,
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

/// One `[[queues.members]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberConfig {
    pub agent_id: String,
    #[serde(default)]
    pub penalty: i32,
    /// Members start logged in unless this is false
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_strategy() -> String {
    Strategy::default().as_str().to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_wait() -> u32 {
    3600
}

fn default_service_level() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

impl QueueConfig {
    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        self.strategy
            .parse()
            .map_err(|_| ConfigError::UnknownStrategy {
                queue: self.id,
                strategy: self.strategy.clone(),
            })
    }

    /// Registry record for this entry, without its overflow target.
    ///
    /// Overflow is applied in a second pass once every queue exists.
    pub fn to_queue(&self) -> Result<Queue, ConfigError> {
        let mut queue = Queue::new(QueueId(self.id), self.tenant.clone(), self.name.clone())
            .with_strategy(self.strategy()?);
        queue.timeout = self.timeout;
        queue.max_wait = self.max_wait;
        queue.service_level = self.service_level;
        queue.weight = self.weight;
        queue.max_callers = self.max_callers;
        queue.max_members = self.max_members;
        Ok(queue)
    }
}
