//! Stats Store module.
//!
//! Per-(queue, member) call counters and the per-queue round-robin cursor.
//! Strategies read from the store; only the distribution service's post-call
//! update writes counters.

mod memory;

pub use memory::MemoryStatsStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::registry::{MemberId, QueueId};

/// Errors from a stats backing store.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    /// The backing store could not be reached. Counters are left untouched.
    #[error("stats store unavailable: {0}")]
    Unavailable(String),

    /// A cursor was advanced over an empty tier.
    #[error("cannot advance round-robin cursor of queue {0} over an empty tier")]
    EmptyTier(QueueId),
}

impl StatsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StatsError::Unavailable(_) => ErrorKind::Unavailable,
            StatsError::EmptyTier(_) => ErrorKind::InvalidState,
        }
    }
}

/// Point-in-time statistics of one queue member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberStats {
    pub calls_taken: u64,
    /// Seconds
    pub total_talk_time: u64,
    /// Seconds, 0 when no call was taken
    pub average_talk_time: f64,
    /// `None` means the member never took a call
    pub last_call_time: Option<DateTime<Utc>>,
}

impl MemberStats {
    pub(crate) fn from_counters(
        calls_taken: u64,
        total_talk_time: u64,
        last_call_time: Option<DateTime<Utc>>,
    ) -> Self {
        let average_talk_time = if calls_taken == 0 {
            0.0
        } else {
            total_talk_time as f64 / calls_taken as f64
        };
        Self {
            calls_taken,
            total_talk_time,
            average_talk_time,
            last_call_time,
        }
    }
}

/// Typed counter store backing the strategy engine.
///
/// Implementations must make `record_call` and `advance_cursor` atomic per
/// key: concurrent callers never lose an increment and never observe the same
/// cursor position twice in a row.
pub trait StatsStore: Send + Sync {
    /// Point read. Never mutates.
    fn get(&self, queue_id: QueueId, member_id: MemberId) -> Result<MemberStats, StatsError>;

    /// Count one completed call of `duration_secs` answered at `at`.
    fn record_call(
        &self,
        queue_id: QueueId,
        member_id: MemberId,
        duration_secs: u64,
        at: DateTime<Utc>,
    ) -> Result<MemberStats, StatsError>;

    /// Advance the queue cursor to `(last + 1) % tier_size` and return it.
    fn advance_cursor(&self, queue_id: QueueId, tier_size: usize) -> Result<usize, StatsError>;

    /// Last persisted cursor position, `-1` before the first advance.
    fn cursor(&self, queue_id: QueueId) -> Result<i64, StatsError>;

    /// Overwrite the cursor position.
    fn seed_cursor(&self, queue_id: QueueId, position: i64) -> Result<(), StatsError>;

    /// Forget the counters of one member.
    fn reset(&self, queue_id: QueueId, member_id: MemberId) -> Result<(), StatsError>;

    /// Forget every counter and the cursor of a queue.
    fn clear_queue(&self, queue_id: QueueId) -> Result<(), StatsError>;
}
