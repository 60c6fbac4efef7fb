//! Append-only event log
//!
//! Events are written here before any counter moves or any subscriber sees
//! them.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Event, EventError, NewEvent};

/// Durable sink for recorded events.
pub trait EventStore: Send + Sync {
    /// Persist an event and return it with its sequence number.
    fn append(&self, event: NewEvent) -> Result<Event, EventError>;

    /// Most recent events of `tenant`, newest last.
    fn recent(&self, tenant: &str, limit: usize) -> Result<Vec<Event>, EventError>;
}

/// In-memory event log keeping the last `capacity` events.
pub struct MemoryEventStore {
    entries: RwLock<VecDeque<Event>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl MemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, event: NewEvent) -> Result<Event, EventError> {
        let mut entries = self.entries.write();
        // Id assignment under the write lock keeps the log ordered by id.
        let event = event.into_event(self.next_id.fetch_add(1, Ordering::SeqCst));
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(event.clone());
        Ok(event)
    }

    fn recent(&self, tenant: &str, limit: usize) -> Result<Vec<Event>, EventError> {
        let entries = self.entries.read();
        let mut recent: Vec<Event> = entries
            .iter()
            .rev()
            .filter(|e| e.tenant == tenant)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}
