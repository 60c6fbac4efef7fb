//! Realtime counters of one queue
//!
//! A board is only ever mutated under its queue's lock, so the agent counters
//! move in -1/+1 pairs and always add up to `agents_logged`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{AgentState, QueueMetrics};
use crate::registry::{AgentId, QueueId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AgentCounts {
    logged: u64,
    available: u64,
    on_call: u64,
    paused: u64,
}

impl AgentCounts {
    fn slot(&mut self, state: AgentState) -> Option<&mut u64> {
        match state {
            AgentState::LoggedOut => None,
            AgentState::Available => Some(&mut self.available),
            AgentState::OnCall => Some(&mut self.on_call),
            AgentState::Paused => Some(&mut self.paused),
        }
    }

    fn shift(&mut self, from: AgentState, to: AgentState) {
        if let Some(count) = self.slot(from) {
            *count = count.saturating_sub(1);
        }
        if let Some(count) = self.slot(to) {
            *count += 1;
        }
        match (from, to) {
            (AgentState::LoggedOut, _) => self.logged += 1,
            (_, AgentState::LoggedOut) => self.logged = self.logged.saturating_sub(1),
            _ => {}
        }
    }
}

#[derive(Debug, Clone)]
struct WaitingCall {
    call_id: Option<String>,
    entered_at: DateTime<Utc>,
}

/// A rejected agent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AgentState,
    pub to: AgentState,
}

/// Counters behind a queue's [`QueueMetrics`].
#[derive(Debug)]
pub struct QueueBoard {
    queue_id: QueueId,
    /// Ordered by entry time
    waiting: Vec<WaitingCall>,
    answered: u64,
    abandoned: u64,
    answered_within_sl: u64,
    total_wait_secs: u64,
    completed: u64,
    total_talk_secs: u64,
    agents: HashMap<AgentId, AgentState>,
    counts: AgentCounts,
}

impl QueueBoard {
    pub fn new(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            waiting: Vec::new(),
            answered: 0,
            abandoned: 0,
            answered_within_sl: 0,
            total_wait_secs: 0,
            completed: 0,
            total_talk_secs: 0,
            agents: HashMap::new(),
            counts: AgentCounts::default(),
        }
    }

    pub fn calls_waiting(&self) -> u64 {
        self.waiting.len() as u64
    }

    pub fn call_entered(&mut self, call_id: Option<&str>, at: DateTime<Utc>) {
        self.waiting.push(WaitingCall {
            call_id: call_id.map(str::to_string),
            entered_at: at,
        });
    }

    /// Count an answered call. `service_level_secs` is the queue's threshold.
    pub fn call_answered(&mut self, call_id: Option<&str>, at: DateTime<Utc>, service_level_secs: u32) {
        let wait = self.take_waiting(call_id, at);
        self.answered += 1;
        self.total_wait_secs += wait;
        if wait <= u64::from(service_level_secs) {
            self.answered_within_sl += 1;
        }
    }

    pub fn call_abandoned(&mut self, call_id: Option<&str>, at: DateTime<Utc>) {
        self.take_waiting(call_id, at);
        self.abandoned += 1;
    }

    pub fn call_completed(&mut self, talk_time_secs: u64) {
        self.completed += 1;
        self.total_talk_secs += talk_time_secs;
    }

    /// Remove a waiting call and return how long it waited.
    ///
    /// Unknown or missing call ids take the oldest waiting call; with nothing
    /// waiting the wait is zero and the counter stays at zero.
    fn take_waiting(&mut self, call_id: Option<&str>, at: DateTime<Utc>) -> u64 {
        if self.waiting.is_empty() {
            return 0;
        }
        let index = call_id
            .and_then(|id| {
                self.waiting
                    .iter()
                    .position(|w| w.call_id.as_deref() == Some(id))
            })
            .unwrap_or(0);
        let call = self.waiting.remove(index);
        (at - call.entered_at).num_seconds().max(0) as u64
    }

    /// Move an agent to `to`. Rejected transitions leave every counter as is.
    pub fn transition_agent(
        &mut self,
        agent_id: &AgentId,
        to: AgentState,
    ) -> Result<AgentState, InvalidTransition> {
        let from = self.agent_state(agent_id);
        if !from.can_transition_to(to) {
            return Err(InvalidTransition { from, to });
        }

        self.counts.shift(from, to);
        if to == AgentState::LoggedOut {
            self.agents.remove(agent_id);
        } else {
            self.agents.insert(agent_id.clone(), to);
        }
        Ok(from)
    }

    pub fn agent_state(&self, agent_id: &AgentId) -> AgentState {
        self.agents.get(agent_id).copied().unwrap_or_default()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> QueueMetrics {
        let longest_wait = self
            .waiting
            .iter()
            .map(|w| (now - w.entered_at).num_seconds().max(0) as u64)
            .max()
            .unwrap_or(0);

        let finished = self.answered + self.abandoned;
        let service_level = if finished == 0 {
            100.0
        } else {
            self.answered_within_sl as f64 / finished as f64 * 100.0
        };

        QueueMetrics {
            queue_id: self.queue_id,
            calls_waiting: self.waiting.len() as u64,
            longest_wait,
            service_level,
            abandoned_calls: self.abandoned,
            answered_calls: self.answered,
            average_wait: average(self.total_wait_secs, self.answered),
            average_talk: average(self.total_talk_secs, self.completed),
            agents_logged: self.counts.logged,
            agents_available: self.counts.available,
            agents_on_call: self.counts.on_call,
            agents_paused: self.counts.paused,
            timestamp: now,
        }
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}
