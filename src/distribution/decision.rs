//! Distribution decision history
//!
//! Ring buffer of the most recent decisions for operators and tests.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::registry::{AgentId, QueueId, Strategy};

/// One answer of the distribution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub queue_id: QueueId,
    pub call_id: String,
    pub strategy: Strategy,
    /// `single`, `group` or `no_agent`
    pub outcome: String,
    /// Offered agents in offer order
    pub agents: Vec<AgentId>,
    pub decided_at: DateTime<Utc>,
}

/// Bounded log of recent decisions, oldest evicted first.
pub struct DecisionLog {
    entries: RwLock<VecDeque<Decision>>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn push(&self, decision: Decision) {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(decision);
    }

    /// Up to `limit` most recent decisions, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Decision> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Recent decisions of one queue, oldest first.
    pub fn for_queue(&self, queue_id: QueueId) -> Vec<Decision> {
        self.entries
            .read()
            .iter()
            .filter(|d| d.queue_id == queue_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
