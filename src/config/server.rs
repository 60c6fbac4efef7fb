//! HTTP listener settings

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Smallest body limit that still fits an event with a modest payload.
pub const MIN_BODY_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` as handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation("server.port", "port must be non-zero"));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation("server.host", "host cannot be empty"));
        }
        if self.max_body_bytes < MIN_BODY_BYTES {
            return Err(ConfigError::validation(
                "server.max_body_bytes",
                format!("limit must be at least {} bytes", MIN_BODY_BYTES),
            ));
        }
        Ok(())
    }
}
