//! Member Registry module.
//!
//! Thread-safe in-memory view of queue records and queue memberships. Queue
//! records are read-only to the distribution core; memberships are mutated by
//! agent login, logout and pause actions and read by every strategy call.

mod error;
mod member;
mod queue;

pub use error::*;
pub use member::*;
pub use queue::*;

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// The Registry stores queues and their members.
///
/// Uses concurrent maps so membership changes become visible to the next
/// selection without blocking in-flight ones.
///
/// # Examples
///
/// ```
/// use distributor::registry::{AgentId, Queue, QueueId, Registry, Strategy};
///
/// let registry = Registry::new();
/// registry
///     .add_queue(Queue::new(QueueId(1), "tenant-a", "support").with_strategy(Strategy::Linear))
///     .unwrap();
/// registry.add_member(QueueId(1), AgentId::from("alice"), 0).unwrap();
///
/// assert_eq!(registry.available_members(QueueId(1)).unwrap().len(), 1);
/// ```
pub struct Registry {
    queues: DashMap<QueueId, Queue>,
    members: DashMap<MemberId, Member>,
    queue_index: DashMap<QueueId, Vec<MemberId>>,
    next_member_id: AtomicU64,
}

impl Registry {
    /// Create a new empty Registry.
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            members: DashMap::new(),
            queue_index: DashMap::new(),
            next_member_id: AtomicU64::new(1),
        }
    }

    /// Add a queue record.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateQueue` if the id is taken, or
    /// `RegistryError::InvalidOverflow` if the overflow target is not a queue
    /// of the same tenant.
    pub fn add_queue(&self, queue: Queue) -> Result<(), RegistryError> {
        if self.queues.contains_key(&queue.id) {
            return Err(RegistryError::DuplicateQueue(queue.id));
        }
        if let Some(target) = queue.overflow_queue_id {
            self.validate_overflow(&queue, target)?;
        }

        self.queue_index.entry(queue.id).or_default();
        self.queues.insert(queue.id, queue);
        Ok(())
    }

    /// Remove a queue and all of its memberships.
    ///
    /// Queues overflowing into the removed queue lose their overflow target.
    pub fn remove_queue(&self, tenant: &str, queue_id: QueueId) -> Result<Queue, RegistryError> {
        self.get_queue(tenant, queue_id)?;
        let (_, queue) = self
            .queues
            .remove(&queue_id)
            .ok_or(RegistryError::QueueNotFound(queue_id))?;

        if let Some((_, member_ids)) = self.queue_index.remove(&queue_id) {
            for id in member_ids {
                self.members.remove(&id);
            }
        }

        for mut entry in self.queues.iter_mut() {
            if entry.overflow_queue_id == Some(queue_id) {
                tracing::info!(
                    queue_id = %entry.id,
                    removed = %queue_id,
                    "Clearing overflow target of removed queue"
                );
                entry.overflow_queue_id = None;
            }
        }

        Ok(queue)
    }

    /// Look up a queue within a tenant.
    ///
    /// A queue owned by another tenant is reported as not found.
    pub fn get_queue(&self, tenant: &str, queue_id: QueueId) -> Result<Queue, RegistryError> {
        self.queues
            .get(&queue_id)
            .filter(|entry| entry.tenant == tenant)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::QueueNotFound(queue_id))
    }

    /// Look up a queue by id regardless of tenant.
    pub fn get_queue_by_id(&self, queue_id: QueueId) -> Option<Queue> {
        self.queues.get(&queue_id).map(|entry| entry.value().clone())
    }

    /// All queues of a tenant, ordered by id.
    pub fn list_queues(&self, tenant: &str) -> Vec<Queue> {
        let mut queues: Vec<Queue> = self
            .queues
            .iter()
            .filter(|entry| entry.tenant == tenant)
            .map(|entry| entry.value().clone())
            .collect();
        queues.sort_by_key(|q| q.id);
        queues
    }

    /// All queues of every tenant, ordered by id.
    pub fn all_queues(&self) -> Vec<Queue> {
        let mut queues: Vec<Queue> = self.queues.iter().map(|e| e.value().clone()).collect();
        queues.sort_by_key(|q| q.id);
        queues
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Apply a typed update to a queue record.
    pub fn update_queue(
        &self,
        tenant: &str,
        queue_id: QueueId,
        update: QueueUpdate,
    ) -> Result<Queue, RegistryError> {
        self.get_queue(tenant, queue_id)?;
        let mut queue = self
            .queues
            .get_mut(&queue_id)
            .ok_or(RegistryError::QueueNotFound(queue_id))?;
        update.apply(&mut queue);
        Ok(queue.clone())
    }

    /// Set or clear the overflow target of a queue.
    pub fn set_overflow(
        &self,
        tenant: &str,
        queue_id: QueueId,
        target: Option<QueueId>,
        overflow_timeout: u32,
    ) -> Result<Queue, RegistryError> {
        let queue = self.get_queue(tenant, queue_id)?;
        if let Some(target) = target {
            self.validate_overflow(&queue, target)?;
        }

        let mut entry = self
            .queues
            .get_mut(&queue_id)
            .ok_or(RegistryError::QueueNotFound(queue_id))?;
        entry.overflow_queue_id = target;
        entry.overflow_timeout = overflow_timeout;
        Ok(entry.clone())
    }

    fn validate_overflow(&self, queue: &Queue, target: QueueId) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidOverflow {
            queue: queue.id,
            target,
            reason: reason.to_string(),
        };

        if target == queue.id {
            return Err(invalid("a queue cannot overflow into itself"));
        }
        match self.queues.get(&target) {
            Some(t) if t.tenant == queue.tenant => Ok(()),
            Some(_) => Err(invalid("target belongs to another tenant")),
            None => Err(invalid("target queue does not exist")),
        }
    }

    /// Register an agent as a member of a queue.
    ///
    /// Member ids are handed out in registration order.
    pub fn add_member(
        &self,
        queue_id: QueueId,
        agent_id: AgentId,
        penalty: i32,
    ) -> Result<Member, RegistryError> {
        let max_members = self
            .queues
            .get(&queue_id)
            .map(|q| q.max_members)
            .ok_or(RegistryError::QueueNotFound(queue_id))?;

        // The index entry guard serializes membership changes per queue.
        let mut index = self.queue_index.entry(queue_id).or_default();

        if index.iter().any(|id| {
            self.members
                .get(id)
                .is_some_and(|m| m.agent_id == agent_id)
        }) {
            return Err(RegistryError::DuplicateMember {
                queue: queue_id,
                agent: agent_id,
            });
        }
        if max_members > 0 && index.len() >= max_members as usize {
            return Err(RegistryError::QueueFull {
                queue: queue_id,
                max_members,
            });
        }

        let id = MemberId(self.next_member_id.fetch_add(1, Ordering::SeqCst));
        let member = Member::new(id, queue_id, agent_id, penalty);
        self.members.insert(id, member.clone());
        index.push(id);

        tracing::debug!(
            queue_id = %queue_id,
            member_id = %id,
            agent_id = %member.agent_id,
            penalty,
            "Added queue member"
        );
        Ok(member)
    }

    /// Remove a membership.
    pub fn remove_member(&self, member_id: MemberId) -> Result<Member, RegistryError> {
        let (_, member) = self
            .members
            .remove(&member_id)
            .ok_or(RegistryError::MemberNotFound(member_id))?;

        if let Some(mut index) = self.queue_index.get_mut(&member.queue_id) {
            index.retain(|id| *id != member_id);
        }
        Ok(member)
    }

    pub fn get_member(&self, member_id: MemberId) -> Option<Member> {
        self.members.get(&member_id).map(|m| m.value().clone())
    }

    /// All members of a queue, in registration order.
    pub fn list_members(&self, queue_id: QueueId) -> Result<Vec<Member>, RegistryError> {
        let ids = self
            .queue_index
            .get(&queue_id)
            .map(|index| index.value().clone())
            .ok_or(RegistryError::QueueNotFound(queue_id))?;

        Ok(ids
            .iter()
            .filter_map(|id| self.get_member(*id))
            .collect())
    }

    /// Members that may be offered a call right now: available and not paused.
    pub fn available_members(&self, queue_id: QueueId) -> Result<Vec<Member>, RegistryError> {
        let mut members = self.list_members(queue_id)?;
        members.retain(Member::is_eligible);
        Ok(members)
    }

    /// The membership of an agent in a queue.
    pub fn member_for_agent(
        &self,
        queue_id: QueueId,
        agent_id: &AgentId,
    ) -> Result<Member, RegistryError> {
        self.list_members(queue_id)?
            .into_iter()
            .find(|m| &m.agent_id == agent_id)
            .ok_or_else(|| RegistryError::AgentNotInQueue {
                queue: queue_id,
                agent: agent_id.clone(),
            })
    }

    /// Apply a typed update to a membership.
    pub fn update_member(
        &self,
        member_id: MemberId,
        update: MemberUpdate,
    ) -> Result<Member, RegistryError> {
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(RegistryError::MemberNotFound(member_id))?;

        if let Some(penalty) = update.penalty {
            member.penalty = penalty;
        }
        if let Some(available) = update.is_available {
            member.is_available = available;
        }
        Ok(member.clone())
    }

    pub fn set_available(&self, member_id: MemberId, available: bool) -> Result<Member, RegistryError> {
        self.update_member(
            member_id,
            MemberUpdate {
                is_available: Some(available),
                ..Default::default()
            },
        )
    }

    /// Pause a membership. Paused members are never offered calls.
    pub fn pause(&self, member_id: MemberId, reason: Option<String>) -> Result<Member, RegistryError> {
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(RegistryError::MemberNotFound(member_id))?;
        member.pause(reason);
        Ok(member.clone())
    }

    pub fn unpause(&self, member_id: MemberId) -> Result<Member, RegistryError> {
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(RegistryError::MemberNotFound(member_id))?;
        member.unpause();
        Ok(member.clone())
    }

    /// Apply an agent action to the agent's membership in one queue.
    pub fn apply_agent_action(
        &self,
        queue_id: QueueId,
        agent_id: &AgentId,
        action: &AgentAction,
    ) -> Result<Member, RegistryError> {
        let member_id = self.member_for_agent(queue_id, agent_id)?.id;
        let mut member = self
            .members
            .get_mut(&member_id)
            .ok_or(RegistryError::MemberNotFound(member_id))?;
        action.apply(&mut member);

        tracing::debug!(
            queue_id = %queue_id,
            member_id = %member_id,
            agent_id = %agent_id,
            action = action.as_str(),
            "Applied agent action"
        );
        Ok(member.clone())
    }

    /// Mark every membership of an agent within `tenant` available.
    ///
    /// Returns the queues the agent belongs to.
    pub fn login_agent(&self, tenant: &str, agent_id: &AgentId) -> Vec<QueueId> {
        self.for_each_membership(tenant, agent_id, |member| AgentAction::Login.apply(member))
    }

    /// Mark every membership of an agent within `tenant` unavailable and
    /// clear any pause.
    pub fn logout_agent(&self, tenant: &str, agent_id: &AgentId) -> Vec<QueueId> {
        self.for_each_membership(tenant, agent_id, |member| AgentAction::Logout.apply(member))
    }

    /// Queues of `tenant` the agent is a member of, ordered by id.
    pub fn queues_for_agent(&self, tenant: &str, agent_id: &AgentId) -> Vec<QueueId> {
        self.for_each_membership(tenant, agent_id, |_| {})
    }

    fn for_each_membership(
        &self,
        tenant: &str,
        agent_id: &AgentId,
        mut f: impl FnMut(&mut Member),
    ) -> Vec<QueueId> {
        let owned: HashSet<QueueId> = self
            .queues
            .iter()
            .filter(|q| q.tenant == tenant)
            .map(|q| q.id)
            .collect();

        let mut queues = Vec::new();
        for mut entry in self.members.iter_mut() {
            if &entry.agent_id == agent_id && owned.contains(&entry.queue_id) {
                f(entry.value_mut());
                queues.push(entry.queue_id);
            }
        }
        queues.sort();
        queues
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
