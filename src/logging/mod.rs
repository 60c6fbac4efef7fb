//! Structured logging helpers

use crate::config::LoggingConfig;

/// Build the `EnvFilter` directive string for a logging configuration.
///
/// The base level comes first, followed by one `distributor::<component>=<level>`
/// directive per configured component, in component name order.
///
/// # Examples
///
/// ```
/// use distributor::config::{LogFormat, LoggingConfig};
/// use distributor::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("routing".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,distributor::routing=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",distributor::{}={}", component, level));
        }
    }

    filter_str
}
