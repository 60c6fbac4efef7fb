//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Unknown strategy '{strategy}' on queue {queue}")]
    UnknownStrategy { queue: u64, strategy: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::NotFound(_) => ErrorKind::NotFound,
            ConfigError::UnknownStrategy { .. } => ErrorKind::InvalidStrategy,
            ConfigError::Io(_) | ConfigError::Parse(_) | ConfigError::Validation { .. } => {
                ErrorKind::InvalidState
            }
        }
    }

    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}
