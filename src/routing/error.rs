//! Error types for agent selection failures

use crate::error::ErrorKind;
use crate::registry::Strategy;
use crate::stats::StatsError;
use thiserror::Error;

/// Errors that can occur while selecting an agent
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The queue names a strategy with no engine in the lookup table
    #[error("no selection engine registered for strategy '{0}'")]
    UnregisteredStrategy(Strategy),

    /// The stats store failed while a strategy read or advanced it
    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl RoutingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoutingError::UnregisteredStrategy(_) => ErrorKind::InvalidStrategy,
            RoutingError::Stats(e) => e.kind(),
        }
    }
}
