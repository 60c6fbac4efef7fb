use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::QueueId;

/// Queue membership identifier. Assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent identity as known to the call-control collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An agent's association with one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub queue_id: QueueId,
    pub agent_id: AgentId,
    /// Priority tier, lower = preferred
    pub penalty: i32,
    pub is_available: bool,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub pause_start: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(id: MemberId, queue_id: QueueId, agent_id: impl Into<AgentId>, penalty: i32) -> Self {
        Self {
            id,
            queue_id,
            agent_id: agent_id.into(),
            penalty,
            is_available: true,
            paused: false,
            pause_reason: None,
            pause_start: None,
        }
    }

    /// A member can be offered a call only when available and not paused.
    pub fn is_eligible(&self) -> bool {
        self.is_available && !self.paused
    }

    pub(crate) fn pause(&mut self, reason: Option<String>) {
        self.paused = true;
        self.pause_reason = reason;
        self.pause_start = Some(Utc::now());
    }

    pub(crate) fn unpause(&mut self) {
        self.paused = false;
        self.pause_reason = None;
        self.pause_start = None;
    }
}

/// Membership change requested by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentAction {
    Login,
    /// Also clears any pause
    Logout,
    Pause(Option<String>),
    Unpause,
}

impl AgentAction {
    pub(crate) fn apply(&self, member: &mut Member) {
        match self {
            AgentAction::Login => member.is_available = true,
            AgentAction::Logout => {
                member.is_available = false;
                if member.paused {
                    member.unpause();
                }
            }
            AgentAction::Pause(reason) => member.pause(reason.clone()),
            AgentAction::Unpause => member.unpause(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAction::Login => "login",
            AgentAction::Logout => "logout",
            AgentAction::Pause(_) => "pause",
            AgentAction::Unpause => "unpause",
        }
    }
}

/// Typed partial update for a membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberUpdate {
    pub penalty: Option<i32>,
    pub is_available: Option<bool>,
}
