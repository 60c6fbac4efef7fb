use crate::error::ErrorKind;

use super::{AgentId, MemberId, QueueId};

/// Errors that can occur during registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("queue already exists: {0}")]
    DuplicateQueue(QueueId),

    #[error("queue not found: {0}")]
    QueueNotFound(QueueId),

    #[error("queue member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("agent {agent} is not a member of queue {queue}")]
    AgentNotInQueue { queue: QueueId, agent: AgentId },

    #[error("invalid queue strategy: {0}")]
    InvalidStrategy(String),

    #[error("invalid overflow target {target} for queue {queue}: {reason}")]
    InvalidOverflow {
        queue: QueueId,
        target: QueueId,
        reason: String,
    },

    #[error("agent {agent} is already a member of queue {queue}")]
    DuplicateMember { queue: QueueId, agent: AgentId },

    #[error("queue {queue} is full ({max_members} members)")]
    QueueFull { queue: QueueId, max_members: u32 },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::QueueNotFound(_)
            | RegistryError::MemberNotFound(_)
            | RegistryError::AgentNotInQueue { .. } => ErrorKind::NotFound,
            RegistryError::InvalidStrategy(_) => ErrorKind::InvalidStrategy,
            RegistryError::DuplicateQueue(_)
            | RegistryError::DuplicateMember { .. }
            | RegistryError::InvalidOverflow { .. }
            | RegistryError::QueueFull { .. } => ErrorKind::InvalidState,
        }
    }
}
