//! Event and realtime metrics pipeline
//!
//! `record_event` runs three steps in a fixed order: append to the event
//! store, move the realtime counters, publish to subscribers. A store failure
//! stops the pipeline before anything becomes visible.
//!
//! Events naming a queue must come from the tenant that owns it. Agent events
//! also move the agent's queue memberships in the registry, so the next
//! selection sees a logout or a pause.

mod board;
mod bus;
mod store;
mod types;

pub use board::{InvalidTransition, QueueBoard};
pub use bus::{Channel, EventBus, Subscription};
pub use store::{EventStore, MemoryEventStore};
pub use types::*;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::registry::{AgentAction, AgentId, Queue, QueueId, Registry};

/// Errors from the event pipeline
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event store unavailable: {0}")]
    Store(String),

    #[error("queue {queue_id} not found for tenant {tenant}")]
    QueueNotFound { tenant: String, queue_id: QueueId },

    #[error("queue {queue_id} is full ({max_callers} callers waiting)")]
    QueueFull {
        queue_id: QueueId,
        max_callers: u32,
        /// Where the caller should go instead
        overflow: Option<QueueId>,
    },
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::Store(_) => ErrorKind::Unavailable,
            EventError::QueueNotFound { .. } => ErrorKind::NotFound,
            EventError::QueueFull { .. } => ErrorKind::InvalidState,
        }
    }
}

/// Records lifecycle events, keeps realtime queue and agent metrics, and
/// fans events out to subscribers.
pub struct EventPipeline {
    store: Arc<dyn EventStore>,
    bus: EventBus,
    registry: Arc<Registry>,
    boards: DashMap<QueueId, Mutex<QueueBoard>>,
    agents: DashMap<AgentId, AgentMetrics>,
}

impl EventPipeline {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn EventStore>, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            registry,
            boards: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    /// Pipeline with an in-memory store and bus of default sizes.
    pub fn in_memory(registry: Arc<Registry>) -> Self {
        Self::new(
            registry,
            Arc::new(MemoryEventStore::default()),
            EventBus::default(),
        )
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Unscoped subscription, for in-process consumers.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        self.bus.subscribe(channel)
    }

    /// Subscription limited to the events of `tenant`.
    pub fn subscribe_tenant(&self, tenant: &str, channel: Channel) -> Subscription {
        self.bus.subscribe_tenant(tenant, channel)
    }

    /// Record an event stamped with the current time.
    pub fn record_event(
        &self,
        tenant: &str,
        event_type: EventType,
        event_name: &str,
        payload: EventPayload,
    ) -> Result<Event, EventError> {
        self.record_event_at(tenant, event_type, event_name, payload, Utc::now())
    }

    /// Record an event that happened at `at`.
    ///
    /// # Errors
    ///
    /// `QueueNotFound` if the payload names a queue `tenant` does not own,
    /// `QueueFull` for a `call_entered` beyond the queue's `max_callers`, and
    /// `Store` if the event could not be persisted. Nothing is counted or
    /// published on error.
    pub fn record_event_at(
        &self,
        tenant: &str,
        event_type: EventType,
        event_name: &str,
        payload: EventPayload,
        at: DateTime<Utc>,
    ) -> Result<Event, EventError> {
        let queue = match payload.queue_id {
            Some(queue_id) => Some(self.registry.get_queue(tenant, queue_id).map_err(|_| {
                EventError::QueueNotFound {
                    tenant: tenant.to_string(),
                    queue_id,
                }
            })?),
            None => None,
        };

        let new_event = NewEvent {
            tenant: tenant.to_string(),
            timestamp: at,
            event_type,
            event_name: event_name.to_string(),
            payload,
        };

        let entering = event_type == EventType::Call
            && KnownEvent::parse(event_name) == Some(KnownEvent::CallEntered);
        let event = match &queue {
            Some(queue) if entering => self.admit_call(queue, new_event)?,
            _ => {
                let event = self.store.append(new_event)?;
                match event.event_type {
                    EventType::Call => self.apply_call_event(&event, queue.as_ref()),
                    EventType::Agent => self.apply_agent_event(&event),
                    EventType::Queue | EventType::System => {}
                }
                event
            }
        };

        let known = event.known().map_or("other", |k| k.as_str());
        metrics::counter!(
            "distributor_events_total",
            "event_type" => event.event_type.as_str(),
            "event_name" => known
        )
        .increment(1);

        let receivers = self.bus.publish(Arc::new(event.clone()));
        tracing::debug!(
            event_id = event.id,
            tenant = %event.tenant,
            event_type = %event.event_type,
            event_name = %event.event_name,
            receivers,
            "Recorded event"
        );
        Ok(event)
    }

    /// Append and count a `call_entered` under the queue's board lock so the
    /// `max_callers` cap holds for concurrent arrivals.
    fn admit_call(&self, queue: &Queue, new_event: NewEvent) -> Result<Event, EventError> {
        self.with_board(queue.id, |board| -> Result<Event, EventError> {
            let waiting = board.calls_waiting();
            if !queue.accepts_caller(waiting) {
                tracing::info!(
                    queue_id = %queue.id,
                    calls_waiting = waiting,
                    max_callers = queue.max_callers,
                    overflow = ?queue.overflow_queue_id,
                    "Queue full, refusing caller"
                );
                metrics::counter!(
                    "distributor_callers_refused_total",
                    "queue" => queue.id.to_string()
                )
                .increment(1);
                return Err(EventError::QueueFull {
                    queue_id: queue.id,
                    max_callers: queue.max_callers,
                    overflow: queue.overflow_queue_id,
                });
            }

            let event = self.store.append(new_event)?;
            board.call_entered(event.call_id.as_deref(), event.timestamp);
            Ok(event)
        })
    }

    fn apply_call_event(&self, event: &Event, queue: Option<&Queue>) {
        let Some(queue) = queue else {
            return;
        };
        let call_id = event.call_id.as_deref();
        let at = event.timestamp;

        match event.known() {
            Some(KnownEvent::CallAnswered) => {
                let threshold = queue.service_level;
                self.with_board(queue.id, |board| board.call_answered(call_id, at, threshold));
                if let Some(agent_id) = &event.agent_id {
                    self.with_agent(agent_id, at, |agent| agent.calls_taken += 1);
                }
            }
            Some(KnownEvent::CallAbandoned) => {
                self.with_board(queue.id, |board| board.call_abandoned(call_id, at));
            }
            Some(KnownEvent::CallCompleted) => {
                let talk_time = talk_time(event);
                self.with_board(queue.id, |board| board.call_completed(talk_time));
                if let Some(agent_id) = &event.agent_id {
                    self.with_agent(agent_id, at, |agent| {
                        agent.total_talk_time += talk_time;
                        if agent.calls_taken > 0 {
                            agent.average_talk_time =
                                agent.total_talk_time as f64 / agent.calls_taken as f64;
                        }
                    });
                }
            }
            _ => {}
        }
    }

    /// Move the agent on each affected queue's board, then apply the matching
    /// registry action where the board accepted the transition.
    ///
    /// Without a queue in the payload the event covers every queue of the
    /// tenant the agent belongs to.
    fn apply_agent_event(&self, event: &Event) {
        let Some(agent_id) = &event.agent_id else {
            return;
        };
        let Some(known) = event.known() else {
            return;
        };
        let (target, action) = match known {
            KnownEvent::AgentLogin => (AgentState::Available, Some(AgentAction::Login)),
            KnownEvent::AgentLogout => (AgentState::LoggedOut, Some(AgentAction::Logout)),
            KnownEvent::AgentPaused => (
                AgentState::Paused,
                Some(AgentAction::Pause(pause_reason(event))),
            ),
            KnownEvent::AgentUnpaused => (AgentState::Available, Some(AgentAction::Unpause)),
            KnownEvent::AgentCallEnded => (AgentState::Available, None),
            KnownEvent::AgentOnCall => (AgentState::OnCall, None),
            _ => return,
        };

        // Login and logout are valid for every membership at once.
        let (queues, applied) = match (event.queue_id, &action) {
            (Some(queue_id), _) => (vec![queue_id], false),
            (None, Some(AgentAction::Login)) => {
                (self.registry.login_agent(&event.tenant, agent_id), true)
            }
            (None, Some(AgentAction::Logout)) => {
                (self.registry.logout_agent(&event.tenant, agent_id), true)
            }
            (None, _) => (self.registry.queues_for_agent(&event.tenant, agent_id), false),
        };

        let mut moved = queues.is_empty();
        for queue_id in queues {
            let result = self.with_board(queue_id, |board| board.transition_agent(agent_id, target));
            if let Err(InvalidTransition { from, to }) = result {
                tracing::warn!(
                    queue_id = %queue_id,
                    agent_id = %agent_id,
                    from = %from,
                    to = %to,
                    event_name = %event.event_name,
                    "Ignoring invalid agent state transition"
                );
                continue;
            }
            moved = true;

            let Some(action) = action.as_ref().filter(|_| !applied) else {
                continue;
            };
            if let Err(e) = self.registry.apply_agent_action(queue_id, agent_id, action) {
                tracing::debug!(
                    queue_id = %queue_id,
                    agent_id = %agent_id,
                    error = %e,
                    "Agent event for a queue without that membership"
                );
            }
        }

        if moved {
            self.with_agent(agent_id, event.timestamp, |agent| {
                if agent.current_state != target {
                    agent.current_state = target;
                    agent.state_since = event.timestamp;
                }
            });
        }
    }

    fn with_board<R>(&self, queue_id: QueueId, f: impl FnOnce(&mut QueueBoard) -> R) -> R {
        let board = self
            .boards
            .entry(queue_id)
            .or_insert_with(|| Mutex::new(QueueBoard::new(queue_id)))
            .downgrade();
        let mut guard = board.lock();
        f(&mut guard)
    }

    fn with_agent(&self, agent_id: &AgentId, at: DateTime<Utc>, f: impl FnOnce(&mut AgentMetrics)) {
        let mut agent = self
            .agents
            .entry(agent_id.clone())
            .or_insert_with(|| AgentMetrics::new(agent_id.clone(), at));
        f(&mut agent);
    }

    /// Realtime metrics of a queue, `None` if it has not seen any event.
    pub fn queue_metrics(&self, queue_id: QueueId) -> Option<QueueMetrics> {
        self.boards
            .get(&queue_id)
            .map(|board| board.lock().snapshot(Utc::now()))
    }

    /// Realtime metrics of an agent, `None` if it has not seen any event.
    pub fn agent_metrics(&self, agent_id: &AgentId) -> Option<AgentMetrics> {
        self.agents.get(agent_id).map(|a| a.value().clone())
    }

    /// Queues that have a metrics board, ordered by id.
    pub fn tracked_queues(&self) -> Vec<QueueId> {
        let mut ids: Vec<_> = self.boards.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Drop the realtime board of a removed queue.
    pub fn forget_queue(&self, queue_id: QueueId) {
        if self.boards.remove(&queue_id).is_some() {
            tracing::debug!(queue_id = %queue_id, "Dropped queue metrics board");
        }
    }

    /// Most recent events of `tenant`, newest last.
    pub fn recent_events(&self, tenant: &str, limit: usize) -> Result<Vec<Event>, EventError> {
        self.store.recent(tenant, limit)
    }
}

fn talk_time(event: &Event) -> u64 {
    event
        .data
        .get("talk_time")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0)
}

fn pause_reason(event: &Event) -> Option<String> {
    event
        .data
        .get("reason")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
