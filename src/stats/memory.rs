use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::{MemberStats, StatsError, StatsStore};
use crate::registry::{MemberId, QueueId};

/// Sentinel stored in `last_call_ms` for a member that never took a call.
const NEVER: i64 = i64::MIN;

#[derive(Debug)]
struct MemberCounters {
    calls_taken: AtomicU64,
    total_talk_time: AtomicU64,
    /// Milliseconds since the Unix epoch, or `NEVER`
    last_call_ms: AtomicI64,
}

impl MemberCounters {
    fn new() -> Self {
        Self {
            calls_taken: AtomicU64::new(0),
            total_talk_time: AtomicU64::new(0),
            last_call_ms: AtomicI64::new(NEVER),
        }
    }

    fn snapshot(&self) -> MemberStats {
        let last_call_ms = self.last_call_ms.load(Ordering::SeqCst);
        let last_call_time = if last_call_ms == NEVER {
            None
        } else {
            Utc.timestamp_millis_opt(last_call_ms).single()
        };
        MemberStats::from_counters(
            self.calls_taken.load(Ordering::SeqCst),
            self.total_talk_time.load(Ordering::SeqCst),
            last_call_time,
        )
    }
}

/// In-process stats store built on lock-free atomics.
///
/// # Examples
///
/// ```
/// use distributor::registry::{MemberId, QueueId};
/// use distributor::stats::{MemoryStatsStore, StatsStore};
///
/// let store = MemoryStatsStore::new();
/// store.record_call(QueueId(1), MemberId(1), 120, chrono::Utc::now()).unwrap();
///
/// let stats = store.get(QueueId(1), MemberId(1)).unwrap();
/// assert_eq!(stats.calls_taken, 1);
/// assert_eq!(stats.total_talk_time, 120);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    counters: DashMap<(QueueId, MemberId), MemberCounters>,
    cursors: DashMap<QueueId, AtomicI64>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn get(&self, queue_id: QueueId, member_id: MemberId) -> Result<MemberStats, StatsError> {
        Ok(self
            .counters
            .get(&(queue_id, member_id))
            .map(|c| c.snapshot())
            .unwrap_or_default())
    }

    fn record_call(
        &self,
        queue_id: QueueId,
        member_id: MemberId,
        duration_secs: u64,
        at: DateTime<Utc>,
    ) -> Result<MemberStats, StatsError> {
        let counters = self
            .counters
            .entry((queue_id, member_id))
            .or_insert_with(MemberCounters::new)
            .downgrade();

        counters.calls_taken.fetch_add(1, Ordering::SeqCst);
        counters
            .total_talk_time
            .fetch_add(duration_secs, Ordering::SeqCst);
        // Out-of-order completions never move the last call time backwards.
        counters
            .last_call_ms
            .fetch_max(at.timestamp_millis(), Ordering::SeqCst);

        Ok(counters.snapshot())
    }

    fn advance_cursor(&self, queue_id: QueueId, tier_size: usize) -> Result<usize, StatsError> {
        if tier_size == 0 {
            return Err(StatsError::EmptyTier(queue_id));
        }
        let size = tier_size as i64;
        let cursor = self
            .cursors
            .entry(queue_id)
            .or_insert_with(|| AtomicI64::new(-1))
            .downgrade();

        let next = |last: i64| (last + 1).rem_euclid(size);
        let previous = cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(next(last)))
            .map_err(|_| StatsError::Unavailable("cursor update rejected".to_string()))?;

        Ok(next(previous) as usize)
    }

    fn cursor(&self, queue_id: QueueId) -> Result<i64, StatsError> {
        Ok(self
            .cursors
            .get(&queue_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(-1))
    }

    fn seed_cursor(&self, queue_id: QueueId, position: i64) -> Result<(), StatsError> {
        self.cursors
            .entry(queue_id)
            .or_insert_with(|| AtomicI64::new(-1))
            .store(position, Ordering::SeqCst);
        Ok(())
    }

    fn reset(&self, queue_id: QueueId, member_id: MemberId) -> Result<(), StatsError> {
        self.counters.remove(&(queue_id, member_id));
        Ok(())
    }

    fn clear_queue(&self, queue_id: QueueId) -> Result<(), StatsError> {
        self.counters.retain(|(q, _), _| *q != queue_id);
        self.cursors.remove(&queue_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unknown_member_reads_as_never_called() {
        let store = MemoryStatsStore::new();
        let stats = store.get(QueueId(1), MemberId(1)).unwrap();
        assert_eq!(stats, MemberStats::default());
        assert!(stats.last_call_time.is_none());
    }

    #[test]
    fn test_record_call_accumulates() {
        let store = MemoryStatsStore::new();
        let now = Utc::now();
        store.record_call(QueueId(1), MemberId(1), 60, now).unwrap();
        let stats = store.record_call(QueueId(1), MemberId(1), 30, now).unwrap();

        assert_eq!(stats.calls_taken, 2);
        assert_eq!(stats.total_talk_time, 90);
        assert!((stats.average_talk_time - 45.0).abs() < f64::EPSILON);
        assert_eq!(
            stats.last_call_time.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
    }

    #[test]
    fn test_last_call_time_never_goes_backwards() {
        let store = MemoryStatsStore::new();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);
        store.record_call(QueueId(1), MemberId(1), 10, later).unwrap();
        let stats = store.record_call(QueueId(1), MemberId(1), 10, earlier).unwrap();
        assert_eq!(
            stats.last_call_time.map(|t| t.timestamp_millis()),
            Some(later.timestamp_millis())
        );
    }

    #[test]
    fn test_counters_are_keyed_per_queue() {
        let store = MemoryStatsStore::new();
        store
            .record_call(QueueId(1), MemberId(1), 10, Utc::now())
            .unwrap();
        assert_eq!(store.get(QueueId(2), MemberId(1)).unwrap().calls_taken, 0);
    }

    #[test]
    fn test_concurrent_record_call_loses_no_updates() {
        let store = Arc::new(MemoryStatsStore::new());
        let threads = 16;
        let per_thread = 250;
        let duration = 7;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store
                            .record_call(QueueId(1), MemberId(1), duration, Utc::now())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.get(QueueId(1), MemberId(1)).unwrap();
        let n = (threads * per_thread) as u64;
        assert_eq!(stats.calls_taken, n);
        assert_eq!(stats.total_talk_time, n * duration);
    }

    #[test]
    fn test_cursor_starts_before_first_position() {
        let store = MemoryStatsStore::new();
        assert_eq!(store.cursor(QueueId(1)).unwrap(), -1);
        assert_eq!(store.advance_cursor(QueueId(1), 3).unwrap(), 0);
        assert_eq!(store.advance_cursor(QueueId(1), 3).unwrap(), 1);
        assert_eq!(store.advance_cursor(QueueId(1), 3).unwrap(), 2);
        assert_eq!(store.advance_cursor(QueueId(1), 3).unwrap(), 0);
        assert_eq!(store.cursor(QueueId(1)).unwrap(), 0);
    }

    #[test]
    fn test_cursor_wraps_when_tier_shrinks() {
        let store = MemoryStatsStore::new();
        store.seed_cursor(QueueId(1), 7).unwrap();
        assert_eq!(store.advance_cursor(QueueId(1), 3).unwrap(), 2);
    }

    #[test]
    fn test_advance_cursor_rejects_empty_tier() {
        let store = MemoryStatsStore::new();
        assert!(matches!(
            store.advance_cursor(QueueId(1), 0),
            Err(StatsError::EmptyTier(QueueId(1)))
        ));
    }

    #[test]
    fn test_concurrent_cursor_advance_hands_out_each_slot_evenly() {
        let store = Arc::new(MemoryStatsStore::new());
        let tier = 4;
        let threads = 8;
        let per_thread = 100;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| store.advance_cursor(QueueId(1), tier).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = vec![0usize; tier];
        for handle in handles {
            for position in handle.join().unwrap() {
                counts[position] += 1;
            }
        }
        assert!(counts.iter().all(|&c| c == threads * per_thread / tier));
    }

    #[test]
    fn test_reset_and_clear_queue() {
        let store = MemoryStatsStore::new();
        store.record_call(QueueId(1), MemberId(1), 5, Utc::now()).unwrap();
        store.record_call(QueueId(1), MemberId(2), 5, Utc::now()).unwrap();
        store.advance_cursor(QueueId(1), 2).unwrap();

        store.reset(QueueId(1), MemberId(1)).unwrap();
        assert_eq!(store.get(QueueId(1), MemberId(1)).unwrap().calls_taken, 0);
        assert_eq!(store.get(QueueId(1), MemberId(2)).unwrap().calls_taken, 1);

        store.clear_queue(QueueId(1)).unwrap();
        assert_eq!(store.get(QueueId(1), MemberId(2)).unwrap().calls_taken, 0);
        assert_eq!(store.cursor(QueueId(1)).unwrap(), -1);
    }
}
