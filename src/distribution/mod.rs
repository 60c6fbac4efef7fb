//! Distribution service
//!
//! Resolves a queue, loads its eligible members with their stats, runs the
//! queue's strategy and records the decision. Also owns the post-call stats
//! update, the only writer of member counters.

mod connect;
mod decision;
mod error;

pub use connect::{ConnectOutcome, SequentialConnector};
pub use decision::{Decision, DecisionLog};
pub use error::DistributionError;

use chrono::Utc;
use std::sync::Arc;

use crate::registry::{Member, MemberId, Queue, QueueId, Registry, RegistryError};
use crate::routing::{Candidate, Selection, SelectionContext, StrategyTable};
use crate::stats::{MemberStats, StatsStore};

/// Picks agents for calls and keeps their stats.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use distributor::distribution::DistributionService;
/// use distributor::registry::{Queue, QueueId, Registry, Strategy};
/// use distributor::routing::Selection;
/// use distributor::stats::MemoryStatsStore;
///
/// let registry = Arc::new(Registry::new());
/// registry
///     .add_queue(Queue::new(QueueId(1), "tenant-a", "support").with_strategy(Strategy::Linear))
///     .unwrap();
/// registry.add_member(QueueId(1), "alice".into(), 0).unwrap();
///
/// let service = DistributionService::new(registry, Arc::new(MemoryStatsStore::new()));
/// let selection = service.get_next_agent("tenant-a", QueueId(1), "call-1").unwrap();
/// assert!(matches!(selection, Selection::Single(_)));
/// ```
pub struct DistributionService {
    registry: Arc<Registry>,
    stats: Arc<dyn StatsStore>,
    strategies: StrategyTable,
    decisions: DecisionLog,
}

impl DistributionService {
    pub fn new(registry: Arc<Registry>, stats: Arc<dyn StatsStore>) -> Self {
        Self {
            registry,
            stats,
            strategies: StrategyTable::standard(),
            decisions: DecisionLog::default(),
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyTable) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_decision_capacity(mut self, capacity: usize) -> Self {
        self.decisions = DecisionLog::new(capacity);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    /// Choose the agent(s) to offer `call_id` to.
    ///
    /// # Errors
    ///
    /// `NotFound` if the queue does not exist for the tenant, `InvalidStrategy`
    /// if no engine is registered for the queue's strategy. An empty queue is
    /// not an error: it yields [`Selection::NoAgent`].
    pub fn get_next_agent(
        &self,
        tenant: &str,
        queue_id: QueueId,
        call_id: &str,
    ) -> Result<Selection, DistributionError> {
        self.get_next_agent_excluding(tenant, queue_id, call_id, &[])
    }

    /// Like [`get_next_agent`](Self::get_next_agent), skipping members that
    /// were already offered this call.
    pub fn get_next_agent_excluding(
        &self,
        tenant: &str,
        queue_id: QueueId,
        call_id: &str,
        exclude: &[MemberId],
    ) -> Result<Selection, DistributionError> {
        let queue = self.registry.get_queue(tenant, queue_id)?;
        let engine = self.strategies.get(queue.strategy)?;

        let candidates = self
            .registry
            .available_members(queue_id)?
            .into_iter()
            .filter(|m| !exclude.contains(&m.id))
            .map(|member| -> Result<Candidate, DistributionError> {
                let stats = self.stats.get(queue_id, member.id)?;
                Ok(Candidate::new(member, stats))
            })
            .collect::<Result<Vec<_>, DistributionError>>()?;

        let ctx = SelectionContext {
            queue: &queue,
            call_id,
            stats: self.stats.as_ref(),
        };
        let selection = engine.select(&ctx, &candidates)?;

        let agents: Vec<_> = selection.agent_ids().into_iter().cloned().collect();
        tracing::debug!(
            queue_id = %queue_id,
            call_id,
            strategy = %queue.strategy,
            candidates = candidates.len(),
            outcome = selection.outcome(),
            agents = ?agents,
            "Distribution decision"
        );
        metrics::counter!(
            "distributor_distributions_total",
            "queue" => queue_id.to_string(),
            "strategy" => queue.strategy.as_str(),
            "outcome" => selection.outcome()
        )
        .increment(1);

        self.decisions.push(Decision {
            queue_id,
            call_id: call_id.to_string(),
            strategy: queue.strategy,
            outcome: selection.outcome().to_string(),
            agents,
            decided_at: Utc::now(),
        });

        Ok(selection)
    }

    /// Count a completed call of `call_duration` seconds for a member.
    pub fn update_stats(
        &self,
        queue_id: QueueId,
        member_id: MemberId,
        call_duration: u64,
    ) -> Result<MemberStats, DistributionError> {
        self.membership(queue_id, member_id)?;
        let stats = self
            .stats
            .record_call(queue_id, member_id, call_duration, Utc::now())?;

        metrics::histogram!(
            "distributor_call_duration_seconds",
            "queue" => queue_id.to_string()
        )
        .record(call_duration as f64);
        tracing::debug!(
            queue_id = %queue_id,
            member_id = %member_id,
            call_duration,
            calls_taken = stats.calls_taken,
            "Updated member stats"
        );
        Ok(stats)
    }

    /// Point read of a member's stats.
    pub fn get_stats(
        &self,
        queue_id: QueueId,
        member_id: MemberId,
    ) -> Result<MemberStats, DistributionError> {
        self.membership(queue_id, member_id)?;
        Ok(self.stats.get(queue_id, member_id)?)
    }

    /// Remove a queue with its memberships, counters and round-robin cursor.
    ///
    /// A queue later added under the same id starts from fresh stats.
    pub fn remove_queue(&self, tenant: &str, queue_id: QueueId) -> Result<Queue, DistributionError> {
        let queue = self.registry.remove_queue(tenant, queue_id)?;
        self.stats.clear_queue(queue_id)?;
        tracing::info!(queue_id = %queue_id, tenant, "Removed queue");
        Ok(queue)
    }

    /// Remove one membership and forget its counters.
    pub fn remove_member(
        &self,
        tenant: &str,
        queue_id: QueueId,
        member_id: MemberId,
    ) -> Result<Member, DistributionError> {
        self.registry.get_queue(tenant, queue_id)?;
        self.membership(queue_id, member_id)?;
        let member = self.registry.remove_member(member_id)?;
        self.stats.reset(queue_id, member_id)?;
        tracing::info!(
            queue_id = %queue_id,
            member_id = %member_id,
            agent_id = %member.agent_id,
            "Removed queue member"
        );
        Ok(member)
    }

    fn membership(&self, queue_id: QueueId, member_id: MemberId) -> Result<Member, RegistryError> {
        if self.registry.get_queue_by_id(queue_id).is_none() {
            return Err(RegistryError::QueueNotFound(queue_id));
        }
        self.registry
            .get_member(member_id)
            .filter(|m| m.queue_id == queue_id)
            .ok_or(RegistryError::MemberNotFound(member_id))
    }
}
