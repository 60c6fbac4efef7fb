//! Event records and realtime metric snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::{AgentId, QueueId};

/// Coarse category of a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Call,
    Agent,
    Queue,
    System,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Call => "call",
            EventType::Agent => "agent",
            EventType::Queue => "queue",
            EventType::System => "system",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event names that move realtime counters. Anything else is recorded and
/// published only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownEvent {
    CallEntered,
    CallAnswered,
    CallAbandoned,
    CallCompleted,
    AgentLogin,
    AgentLogout,
    AgentPaused,
    AgentUnpaused,
    AgentOnCall,
    AgentCallEnded,
}

impl KnownEvent {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "call_entered" => Some(KnownEvent::CallEntered),
            "call_answered" => Some(KnownEvent::CallAnswered),
            "call_abandoned" => Some(KnownEvent::CallAbandoned),
            "call_completed" => Some(KnownEvent::CallCompleted),
            "agent_login" => Some(KnownEvent::AgentLogin),
            "agent_logout" => Some(KnownEvent::AgentLogout),
            "agent_paused" => Some(KnownEvent::AgentPaused),
            "agent_unpaused" => Some(KnownEvent::AgentUnpaused),
            "agent_on_call" => Some(KnownEvent::AgentOnCall),
            "agent_call_ended" => Some(KnownEvent::AgentCallEnded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KnownEvent::CallEntered => "call_entered",
            KnownEvent::CallAnswered => "call_answered",
            KnownEvent::CallAbandoned => "call_abandoned",
            KnownEvent::CallCompleted => "call_completed",
            KnownEvent::AgentLogin => "agent_login",
            KnownEvent::AgentLogout => "agent_logout",
            KnownEvent::AgentPaused => "agent_paused",
            KnownEvent::AgentUnpaused => "agent_unpaused",
            KnownEvent::AgentOnCall => "agent_on_call",
            KnownEvent::AgentCallEnded => "agent_call_ended",
        }
    }
}

/// Payload of an incoming event.
///
/// The routing keys are typed; everything else is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<QueueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(mut self, queue_id: QueueId) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    pub fn agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn call(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Non-negative integer field of the free-form part, e.g. `talk_time`.
    pub fn seconds(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(serde_json::Value::as_u64)
    }
}

/// A recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number assigned by the event store
    pub id: u64,
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub event_name: String,
    pub queue_id: Option<QueueId>,
    pub agent_id: Option<AgentId>,
    pub call_id: Option<String>,
    pub data: serde_json::Value,
}

impl Event {
    pub fn known(&self) -> Option<KnownEvent> {
        KnownEvent::parse(&self.event_name)
    }
}

/// An event before the store has assigned it a sequence number.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub tenant: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub event_name: String,
    pub payload: EventPayload,
}

impl NewEvent {
    pub(crate) fn into_event(self, id: u64) -> Event {
        let data = serde_json::to_value(&self.payload).unwrap_or(serde_json::Value::Null);
        Event {
            id,
            tenant: self.tenant,
            timestamp: self.timestamp,
            event_type: self.event_type,
            event_name: self.event_name,
            queue_id: self.payload.queue_id,
            agent_id: self.payload.agent_id,
            call_id: self.payload.call_id,
            data,
        }
    }
}

/// Agent presence as seen by one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    LoggedOut,
    Available,
    OnCall,
    Paused,
}

impl AgentState {
    /// Whether moving from `self` to `to` follows
    /// `logged_out -> available -> {on_call, paused} -> available -> logged_out`.
    ///
    /// Logging out is allowed from any logged-in state.
    pub fn can_transition_to(self, to: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, to),
            (LoggedOut, Available)
                | (Available, OnCall)
                | (Available, Paused)
                | (OnCall, Available)
                | (Paused, Available)
                | (Available, LoggedOut)
                | (OnCall, LoggedOut)
                | (Paused, LoggedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::LoggedOut => "logged_out",
            AgentState::Available => "available",
            AgentState::OnCall => "on_call",
            AgentState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realtime snapshot of one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetrics {
    pub queue_id: QueueId,
    pub calls_waiting: u64,
    /// Seconds the oldest waiting call has waited
    pub longest_wait: u64,
    /// Percentage of finished calls answered within the queue's threshold
    pub service_level: f64,
    pub abandoned_calls: u64,
    pub answered_calls: u64,
    /// Seconds, over answered calls
    pub average_wait: f64,
    /// Seconds, over completed calls
    pub average_talk: f64,
    pub agents_logged: u64,
    pub agents_available: u64,
    pub agents_on_call: u64,
    pub agents_paused: u64,
    pub timestamp: DateTime<Utc>,
}

impl QueueMetrics {
    /// Metrics of a queue that has not seen any event.
    pub fn empty(queue_id: QueueId) -> Self {
        Self {
            queue_id,
            calls_waiting: 0,
            longest_wait: 0,
            service_level: 100.0,
            abandoned_calls: 0,
            answered_calls: 0,
            average_wait: 0.0,
            average_talk: 0.0,
            agents_logged: 0,
            agents_available: 0,
            agents_on_call: 0,
            agents_paused: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Realtime snapshot of one agent across all queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: AgentId,
    pub calls_taken: u64,
    pub total_talk_time: u64,
    pub average_talk_time: f64,
    pub current_state: AgentState,
    pub state_since: DateTime<Utc>,
}

impl AgentMetrics {
    pub(crate) fn new(agent_id: AgentId, at: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            calls_taken: 0,
            total_talk_time: 0,
            average_talk_time: 0.0,
            current_state: AgentState::LoggedOut,
            state_since: at,
        }
    }
}
