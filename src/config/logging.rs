//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

use super::ConfigError;

/// Modules that accept a `component_levels` entry. Each maps to the
/// `distributor::<component>` tracing target.
pub const COMPONENTS: &[&str] = &[
    "api",
    "call_control",
    "distribution",
    "events",
    "failover",
    "registry",
    "routing",
    "stats",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for every target without a component override
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels keyed by [`COMPONENTS`] name, e.g. `events = "debug"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}

impl LoggingConfig {
    /// Effective level of one component.
    pub fn level_for(&self, component: &str) -> &str {
        self.component_levels
            .as_ref()
            .and_then(|levels| levels.get(component))
            .map(String::as_str)
            .unwrap_or(&self.level)
    }

    /// Levels must be tracing levels and components must name a module.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level("logging.level", &self.level)?;

        for (component, level) in self.component_levels.iter().flatten() {
            let field = format!("logging.component_levels.{}", component);
            if !COMPONENTS.contains(&component.as_str()) {
                return Err(ConfigError::validation(
                    field,
                    format!("unknown component, expected one of {}", COMPONENTS.join(", ")),
                ));
            }
            parse_level(&field, level)?;
        }
        Ok(())
    }
}

fn parse_level(field: &str, level: &str) -> Result<LevelFilter, ConfigError> {
    LevelFilter::from_str(level)
        .map_err(|_| ConfigError::validation(field, format!("'{}' is not a log level", level)))
}
