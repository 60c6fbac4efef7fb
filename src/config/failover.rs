//! Failover scheduler settings

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverSchedulerConfig {
    /// Run the background checker
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for FailoverSchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 10,
        }
    }
}
