use thiserror::Error;

use crate::call_control::CallControlError;
use crate::error::ErrorKind;
use crate::registry::RegistryError;
use crate::routing::RoutingError;
use crate::stats::StatsError;

/// Errors surfaced by the distribution service
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    CallControl(#[from] CallControlError),
}

impl DistributionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DistributionError::Registry(e) => e.kind(),
            DistributionError::Routing(e) => e.kind(),
            DistributionError::Stats(e) => e.kind(),
            DistributionError::CallControl(e) => e.kind(),
        }
    }
}
