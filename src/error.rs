//! Error taxonomy shared by every module.
//!
//! Each module owns its own `thiserror` enum; `ErrorKind` is the coarse
//! classification callers use to decide how to respond.

use serde::{Deserialize, Serialize};

/// Coarse classification of a core failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Queue, member or failover config absent. Never fatal.
    NotFound,
    /// A queue record names a strategy with no registered engine.
    InvalidStrategy,
    /// The requested transition is not allowed in the current state.
    InvalidState,
    /// A downstream collaborator or backing store failed. Callers retry with backoff.
    Unavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidStrategy => write!(f, "invalid_strategy"),
            ErrorKind::InvalidState => write!(f, "invalid_state"),
            ErrorKind::Unavailable => write!(f, "unavailable"),
        }
    }
}
