//! Call-control collaborator settings

use serde::{Deserialize, Serialize};

/// Connection to the REST service that rings agents.
///
/// ```toml
/// [call_control]
/// enabled = true
/// base_url = "http://calld:9500/1.0"
/// token_env = "CALLD_TOKEN"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallControlConfig {
    /// Without call control the connect endpoint is not served
    pub enabled: bool,
    pub base_url: String,
    /// Name of the environment variable holding the auth token
    pub token_env: Option<String>,
    /// Default ring time per agent in seconds
    pub ring_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for CallControlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:9500/1.0".to_string(),
            token_env: None,
            ring_timeout_seconds: 15,
            request_timeout_seconds: 5,
        }
    }
}
