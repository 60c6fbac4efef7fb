//! Configuration module
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`DISTRIBUTOR_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use distributor::config::DistributorConfig;
//!
//! let config = DistributorConfig::default();
//! assert_eq!(config.server.port, 8000);
//!
//! let toml = r#"
//! [server]
//! port = 9000
//!
//! [[queues]]
//! id = 1
//! tenant = "acme"
//! name = "support"
//! strategy = "fewestcalls"
//! "#;
//! let config: DistributorConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! assert!(config.validate().is_ok());
//! ```

pub mod call_control;
pub mod error;
pub mod events;
pub mod failover;
pub mod logging;
pub mod queue;
pub mod server;

pub use call_control::CallControlConfig;
pub use error::ConfigError;
pub use events::EventsConfig;
pub use failover::FailoverSchedulerConfig;
pub use logging::{LogFormat, LoggingConfig, COMPONENTS};
pub use queue::{MemberConfig, QueueConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::failover::NewFailoverConfig;

/// Unified configuration for the distributor service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DistributorConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub events: EventsConfig,
    pub call_control: CallControlConfig,
    pub failover: FailoverSchedulerConfig,
    /// Queues loaded into the registry at startup
    pub queues: Vec<QueueConfig>,
    /// Failover rules loaded at startup
    pub failover_configs: Vec<NewFailoverConfig>,
}

impl DistributorConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `DISTRIBUTOR_*` environment variable overrides.
    ///
    /// Invalid values are ignored and the current value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("DISTRIBUTOR_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("DISTRIBUTOR_HOST") {
            self.server.host = host;
        }

        if let Ok(level) = std::env::var("DISTRIBUTOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DISTRIBUTOR_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(url) = std::env::var("DISTRIBUTOR_CALL_CONTROL_URL") {
            self.call_control.base_url = url;
            self.call_control.enabled = true;
        }
        if let Ok(scheduler) = std::env::var("DISTRIBUTOR_FAILOVER_SCHEDULER") {
            self.failover.enabled = scheduler.to_lowercase() == "true";
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        if self.events.bus_capacity == 0 {
            return Err(ConfigError::validation(
                "events.bus_capacity",
                "capacity must be non-zero",
            ));
        }
        if self.failover.interval_seconds == 0 {
            return Err(ConfigError::validation(
                "failover.interval_seconds",
                "interval must be non-zero",
            ));
        }

        let mut tenants: HashMap<u64, &str> = HashMap::new();
        for (i, queue) in self.queues.iter().enumerate() {
            if tenants.insert(queue.id, &queue.tenant).is_some() {
                return Err(ConfigError::validation(
                    format!("queues[{}].id", i),
                    format!("duplicate queue id {}", queue.id),
                ));
            }
            queue.strategy()?;

            for (j, member) in queue.members.iter().enumerate() {
                if member.agent_id.is_empty() {
                    return Err(ConfigError::validation(
                        format!("queues[{}].members[{}].agent_id", i, j),
                        "agent id cannot be empty",
                    ));
                }
            }
        }

        for (i, queue) in self.queues.iter().enumerate() {
            let Some(target) = queue.overflow_queue_id else {
                continue;
            };
            let field = format!("queues[{}].overflow_queue_id", i);
            if target == queue.id {
                return Err(ConfigError::validation(field, "queue cannot overflow into itself"));
            }
            match tenants.get(&target) {
                Some(tenant) if *tenant == queue.tenant => {}
                Some(_) => {
                    return Err(ConfigError::validation(
                        field,
                        "target belongs to another tenant",
                    ))
                }
                None => {
                    return Err(ConfigError::validation(
                        field,
                        format!("queue {} is not configured", target),
                    ))
                }
            }
        }

        for (i, rule) in self.failover_configs.iter().enumerate() {
            if tenants.get(&rule.queue_id.0) != Some(&rule.tenant.as_str()) {
                return Err(ConfigError::validation(
                    format!("failover_configs[{}].queue_id", i),
                    format!(
                        "queue {} is not configured for tenant {}",
                        rule.queue_id, rule.tenant
                    ),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::FailoverType;
    use crate::registry::QueueId;

    fn queue(id: u64, tenant: &str) -> QueueConfig {
        toml::from_str(&format!(
            "id = {}\ntenant = \"{}\"\nname = \"q{}\"",
            id, tenant, id
        ))
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = DistributorConfig::default();
        assert_eq!(config.server.port, 8000);
        assert!(config.failover.enabled);
        assert!(!config.call_control.enabled);
        assert!(config.queues.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_example_file() {
        let toml = include_str!("../../distributor.example.toml");
        let config: DistributorConfig = toml::from_str(toml).unwrap();
        assert!(!config.queues.is_empty());
        assert!(!config.failover_configs.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_config_parse_queues_and_members() {
        let config: DistributorConfig = toml::from_str(
            r#"
            [[queues]]
            id = 1
            tenant = "acme"
            name = "support"
            strategy = "linear"
            overflow_queue_id = 2

            [[queues.members]]
            agent_id = "alice"

            [[queues.members]]
            agent_id = "bob"
            penalty = 1

            [[queues]]
            id = 2
            tenant = "acme"
            name = "backup"
            "#,
        )
        .unwrap();

        assert_eq!(config.queues.len(), 2);
        assert_eq!(config.queues[0].members[1].penalty, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8080").unwrap();

        let config = DistributorConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = DistributorConfig::load(Some(Path::new("/nonexistent/distributor.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_malformed_file_is_parse_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nport = ").unwrap();

        let result = DistributorConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_env_override_port() {
        std::env::set_var("DISTRIBUTOR_PORT", "9999");
        let config = DistributorConfig::default().with_env_overrides();
        assert_eq!(config.server.port, 9999);

        std::env::set_var("DISTRIBUTOR_PORT", "not-a-number");
        let config = DistributorConfig::default().with_env_overrides();
        std::env::remove_var("DISTRIBUTOR_PORT");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_config_env_override_log_format() {
        std::env::set_var("DISTRIBUTOR_LOG_FORMAT", "json");
        let config = DistributorConfig::default().with_env_overrides();
        std::env::remove_var("DISTRIBUTOR_LOG_FORMAT");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_config_env_call_control_url_enables_it() {
        std::env::set_var("DISTRIBUTOR_CALL_CONTROL_URL", "http://calld:9500/1.0");
        let config = DistributorConfig::default().with_env_overrides();
        std::env::remove_var("DISTRIBUTOR_CALL_CONTROL_URL");
        assert!(config.call_control.enabled);
        assert_eq!(config.call_control.base_url, "http://calld:9500/1.0");
    }

    #[test]
    fn test_config_env_disable_scheduler() {
        std::env::set_var("DISTRIBUTOR_FAILOVER_SCHEDULER", "false");
        let config = DistributorConfig::default().with_env_overrides();
        std::env::remove_var("DISTRIBUTOR_FAILOVER_SCHEDULER");
        assert!(!config.failover.enabled);
    }

    #[test]
    fn test_config_validation_zero_port() {
        let mut config = DistributorConfig::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "server.port"
        ));
    }

    #[test]
    fn test_config_validation_zero_bus_capacity() {
        let mut config = DistributorConfig::default();
        config.events.bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_duplicate_queue_id() {
        let mut config = DistributorConfig::default();
        config.queues = vec![queue(1, "acme"), queue(1, "acme")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "queues[1].id"
        ));
    }

    #[test]
    fn test_config_validation_unknown_strategy() {
        let mut config = DistributorConfig::default();
        let mut q = queue(1, "acme");
        q.strategy = "weighted".to_string();
        config.queues = vec![q];

        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidStrategy);
    }

    #[test]
    fn test_config_validation_overflow_targets() {
        let mut config = DistributorConfig::default();
        let mut a = queue(1, "acme");
        a.overflow_queue_id = Some(2);
        config.queues = vec![a.clone(), queue(2, "globex")];
        assert!(config.validate().is_err());

        config.queues = vec![a.clone()];
        assert!(config.validate().is_err());

        a.overflow_queue_id = Some(1);
        config.queues = vec![a];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_failover_queue_reference() {
        let mut config = DistributorConfig::default();
        config.queues = vec![queue(1, "acme")];
        config.failover_configs = vec![NewFailoverConfig::new(
            "globex",
            QueueId(1),
            "overflow",
            FailoverType::Voicemail,
            "vm",
        )];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "failover_configs[0].queue_id"
        ));

        config.failover_configs[0].tenant = "acme".to_string();
        assert!(config.validate().is_ok());
    }
}
