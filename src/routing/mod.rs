//! Strategy engine for choosing which agent(s) receive a call
//!
//! Selection is pure over already-loaded candidate data: the caller hands in
//! the queue's eligible members with their stats snapshots, and the engine for
//! the queue's [`Strategy`] picks among the lowest penalty tier. Only
//! `rrmemory` touches shared state, through the stats store cursor.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

pub mod error;
pub mod strategies;

pub use error::RoutingError;
pub use strategies::{FewestCalls, LeastRecent, Linear, Random, RingAll, RoundRobinMemory};

use crate::registry::{AgentId, Member, MemberId, Queue, Strategy};
use crate::stats::{MemberStats, StatsError, StatsStore};

/// An eligible member together with its stats at selection time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub member: Member,
    pub stats: MemberStats,
}

impl Candidate {
    pub fn new(member: Member, stats: MemberStats) -> Self {
        Self { member, stats }
    }

    pub fn member_id(&self) -> MemberId {
        self.member.id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.member.agent_id
    }
}

/// Outcome of a strategy.
///
/// `NoAgent` is a normal outcome, distinct from "selected but not answered",
/// which only the call-control side can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "members", rename_all = "snake_case")]
pub enum Selection {
    Single(Candidate),
    Group(Vec<Candidate>),
    NoAgent,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::NoAgent)
    }

    /// Selected candidates in offer order.
    pub fn candidates(&self) -> Vec<&Candidate> {
        match self {
            Selection::Single(c) => vec![c],
            Selection::Group(group) => group.iter().collect(),
            Selection::NoAgent => Vec::new(),
        }
    }

    pub fn agent_ids(&self) -> Vec<&AgentId> {
        self.candidates().into_iter().map(Candidate::agent_id).collect()
    }

    /// Label used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Selection::Single(_) => "single",
            Selection::Group(_) => "group",
            Selection::NoAgent => "no_agent",
        }
    }
}

/// What a strategy may read besides the candidates.
pub struct SelectionContext<'a> {
    pub queue: &'a Queue,
    pub call_id: &'a str,
    pub stats: &'a dyn StatsStore,
}

/// Common contract of the selection engines.
pub trait SelectionStrategy: Send + Sync {
    /// The strategy this engine implements.
    fn strategy(&self) -> Strategy;

    /// Pick the member(s) to offer the call to.
    ///
    /// Must return [`Selection::NoAgent`] on an empty input rather than fail.
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: &[Candidate],
    ) -> Result<Selection, StatsError>;
}

/// Restrict candidates to the minimum penalty present, ordered by member id.
///
/// # Examples
///
/// ```
/// use distributor::registry::{Member, MemberId, QueueId};
/// use distributor::routing::{lowest_penalty_tier, Candidate};
/// use distributor::stats::MemberStats;
///
/// let candidates = vec![
///     Candidate::new(Member::new(MemberId(3), QueueId(1), "c", 1), MemberStats::default()),
///     Candidate::new(Member::new(MemberId(2), QueueId(1), "b", 0), MemberStats::default()),
///     Candidate::new(Member::new(MemberId(1), QueueId(1), "a", 0), MemberStats::default()),
/// ];
///
/// let tier = lowest_penalty_tier(&candidates);
/// let ids: Vec<_> = tier.iter().map(|c| c.member_id()).collect();
/// assert_eq!(ids, vec![MemberId(1), MemberId(2)]);
/// ```
pub fn lowest_penalty_tier(candidates: &[Candidate]) -> Vec<Candidate> {
    let Some(min_penalty) = candidates.iter().map(|c| c.member.penalty).min() else {
        return Vec::new();
    };

    let mut tier: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.member.penalty == min_penalty)
        .cloned()
        .collect();
    tier.sort_by_key(|c| c.member.id);
    tier
}

/// Lookup table from strategy to engine.
///
/// Adding a strategy means adding a [`Strategy`] variant and registering its
/// engine here.
#[derive(Clone)]
pub struct StrategyTable {
    engines: HashMap<Strategy, Arc<dyn SelectionStrategy>>,
}

impl StrategyTable {
    /// A table with no engines.
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// A table with the six standard engines.
    pub fn standard() -> Self {
        Self::empty()
            .register(RingAll)
            .register(LeastRecent)
            .register(FewestCalls)
            .register(Random)
            .register(RoundRobinMemory)
            .register(Linear)
    }

    /// Register an engine under the strategy it reports, replacing any previous one.
    pub fn register(mut self, engine: impl SelectionStrategy + 'static) -> Self {
        self.engines.insert(engine.strategy(), Arc::new(engine));
        self
    }

    pub fn get(&self, strategy: Strategy) -> Result<Arc<dyn SelectionStrategy>, RoutingError> {
        self.engines
            .get(&strategy)
            .cloned()
            .ok_or(RoutingError::UnregisteredStrategy(strategy))
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for StrategyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut strategies: Vec<_> = self.engines.keys().map(|s| s.as_str()).collect();
        strategies.sort_unstable();
        f.debug_struct("StrategyTable")
            .field("strategies", &strategies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::QueueId;
    use crate::stats::MemoryStatsStore;
    use chrono::{Duration, Utc};

    fn candidate(id: u64, penalty: i32, calls_taken: u64) -> Candidate {
        Candidate::new(
            Member::new(MemberId(id), QueueId(1), format!("agent-{}", id), penalty),
            MemberStats {
                calls_taken,
                ..Default::default()
            },
        )
    }

    fn select(strategy: Strategy, store: &MemoryStatsStore, candidates: &[Candidate]) -> Selection {
        let queue = Queue::new(QueueId(1), "tenant-a", "support").with_strategy(strategy);
        let ctx = SelectionContext {
            queue: &queue,
            call_id: "call-1",
            stats: store,
        };
        StrategyTable::standard()
            .get(strategy)
            .unwrap()
            .select(&ctx, candidates)
            .unwrap()
    }

    fn single_id(selection: &Selection) -> MemberId {
        match selection {
            Selection::Single(c) => c.member_id(),
            other => panic!("expected a single member, got {:?}", other),
        }
    }

    #[test]
    fn standard_table_covers_every_strategy() {
        let table = StrategyTable::standard();
        assert_eq!(table.len(), Strategy::ALL.len());
        for strategy in Strategy::ALL {
            assert_eq!(table.get(strategy).unwrap().strategy(), strategy);
        }
    }

    #[test]
    fn empty_table_reports_invalid_strategy() {
        let err = StrategyTable::empty().get(Strategy::Linear).err().unwrap();
        assert!(matches!(err, RoutingError::UnregisteredStrategy(Strategy::Linear)));
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidStrategy);
    }

    #[test]
    fn register_is_the_extension_point() {
        let table = StrategyTable::empty().register(Linear);
        assert_eq!(table.len(), 1);
        assert!(table.get(Strategy::Linear).is_ok());
        assert!(table.get(Strategy::Random).is_err());
    }

    #[test]
    fn every_strategy_returns_no_agent_on_empty_input() {
        let store = MemoryStatsStore::new();
        for strategy in Strategy::ALL {
            assert_eq!(select(strategy, &store, &[]), Selection::NoAgent, "{}", strategy);
        }
        // An empty tier must not move the cursor.
        assert_eq!(store.cursor(QueueId(1)).unwrap(), -1);
    }

    #[test]
    fn ringall_returns_entire_lowest_tier() {
        let store = MemoryStatsStore::new();
        let candidates = vec![candidate(4, 1, 0), candidate(2, 0, 5), candidate(1, 0, 9)];
        match select(Strategy::RingAll, &store, &candidates) {
            Selection::Group(group) => {
                let ids: Vec<_> = group.iter().map(Candidate::member_id).collect();
                assert_eq!(ids, vec![MemberId(1), MemberId(2)]);
            }
            other => panic!("expected a group, got {:?}", other),
        }
    }

    #[test]
    fn fewestcalls_scenario_prefers_b_over_lower_tier_c() {
        let store = MemoryStatsStore::new();
        let a = candidate(1, 0, 3);
        let b = candidate(2, 0, 1);
        let c = candidate(3, 1, 0);
        let selection = select(Strategy::FewestCalls, &store, &[a, b, c]);
        assert_eq!(single_id(&selection), MemberId(2));
    }

    #[test]
    fn fewestcalls_breaks_ties_by_member_id() {
        let store = MemoryStatsStore::new();
        let selection = select(
            Strategy::FewestCalls,
            &store,
            &[candidate(5, 0, 2), candidate(3, 0, 2)],
        );
        assert_eq!(single_id(&selection), MemberId(3));
    }

    #[test]
    fn leastrecent_prefers_never_called() {
        let store = MemoryStatsStore::new();
        let mut called = candidate(1, 0, 1);
        called.stats.last_call_time = Some(Utc::now() - Duration::days(365));
        let never = candidate(2, 0, 0);

        let selection = select(Strategy::LeastRecent, &store, &[called, never]);
        assert_eq!(single_id(&selection), MemberId(2));
    }

    #[test]
    fn leastrecent_picks_oldest_call() {
        let store = MemoryStatsStore::new();
        let now = Utc::now();
        let mut recent = candidate(1, 0, 1);
        recent.stats.last_call_time = Some(now);
        let mut older = candidate(2, 0, 1);
        older.stats.last_call_time = Some(now - Duration::minutes(10));

        let selection = select(Strategy::LeastRecent, &store, &[recent, older]);
        assert_eq!(single_id(&selection), MemberId(2));
    }

    #[test]
    fn linear_picks_first_registered_in_tier() {
        let store = MemoryStatsStore::new();
        let selection = select(
            Strategy::Linear,
            &store,
            &[candidate(9, 0, 0), candidate(1, 2, 0), candidate(4, 0, 0)],
        );
        assert_eq!(single_id(&selection), MemberId(4));
    }

    #[test]
    fn random_stays_within_tier() {
        let store = MemoryStatsStore::new();
        let candidates = vec![candidate(1, 0, 0), candidate(2, 0, 0), candidate(3, 5, 0)];
        for _ in 0..100 {
            let id = single_id(&select(Strategy::Random, &store, &candidates));
            assert!(id == MemberId(1) || id == MemberId(2));
        }
    }

    #[test]
    fn rrmemory_scenario_cycles_a_b_c_a() {
        let store = MemoryStatsStore::new();
        let candidates = vec![candidate(3, 0, 0), candidate(1, 0, 0), candidate(2, 0, 0)];
        let picks: Vec<_> = (0..4)
            .map(|_| single_id(&select(Strategy::RoundRobinMemory, &store, &candidates)))
            .collect();
        assert_eq!(picks, vec![MemberId(1), MemberId(2), MemberId(3), MemberId(1)]);
        assert_eq!(store.cursor(QueueId(1)).unwrap(), 0);
    }

    #[test]
    fn selection_outcome_labels() {
        assert_eq!(Selection::NoAgent.outcome(), "no_agent");
        assert!(Selection::NoAgent.agent_ids().is_empty());
        let single = Selection::Single(candidate(1, 0, 0));
        assert_eq!(single.outcome(), "single");
        assert_eq!(single.agent_ids(), vec![&AgentId::from("agent-1")]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use proptest::strategy::Strategy;

        fn candidates_strategy() -> impl Strategy<Value = Vec<Candidate>> {
            prop::collection::vec((0i32..4, 0u64..20), 0..12).prop_map(|specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (penalty, calls))| candidate(i as u64 + 1, penalty, calls))
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn prop_selection_stays_in_minimum_tier(candidates in candidates_strategy()) {
                let store = MemoryStatsStore::new();
                let min_penalty = candidates.iter().map(|c| c.member.penalty).min();

                for strategy in crate::registry::Strategy::ALL {
                    let selection = select(strategy, &store, &candidates);
                    match min_penalty {
                        None => prop_assert_eq!(&selection, &Selection::NoAgent),
                        Some(min) => {
                            for c in selection.candidates() {
                                prop_assert_eq!(c.member.penalty, min);
                            }
                            if strategy == crate::registry::Strategy::RingAll {
                                let expected = candidates.iter().filter(|c| c.member.penalty == min).count();
                                prop_assert_eq!(selection.candidates().len(), expected);
                            } else {
                                prop_assert_eq!(selection.candidates().len(), 1);
                            }
                        }
                    }
                }
            }

            #[test]
            fn prop_rrmemory_is_fair_from_any_cursor(
                members in 1usize..8,
                calls in 0usize..60,
                start in -1i64..50,
            ) {
                let store = MemoryStatsStore::new();
                store.seed_cursor(QueueId(1), start).unwrap();
                let candidates: Vec<_> = (1..=members as u64).map(|id| candidate(id, 0, 0)).collect();

                let picks: Vec<MemberId> = (0..calls)
                    .map(|_| single_id(&select(crate::registry::Strategy::RoundRobinMemory, &store, &candidates)))
                    .collect();

                // No member repeats before every other member had a turn.
                for window in picks.windows(members) {
                    let mut seen = window.to_vec();
                    seen.sort();
                    seen.dedup();
                    prop_assert_eq!(seen.len(), window.len());
                }

                for id in 1..=members as u64 {
                    let count = picks.iter().filter(|p| **p == MemberId(id)).count();
                    prop_assert!(count == calls / members || count == calls / members + 1);
                }
            }
        }
    }
}
