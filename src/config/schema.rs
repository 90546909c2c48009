//! Configuration schema definitions.
//!
//! This module defines the configuration file layout for the engine binary.
//! Component sections are kept as raw TOML tables; each component converts
//! its own table into its typed configuration when it is configured.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineSettings;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine timing and channel settings.
    pub engine: EngineSection,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// One table per component, keyed by component name.
    pub components: toml::Table,
}

impl EngineConfig {
    /// Engine settings described by the `[engine]` section.
    pub fn settings(&self) -> EngineSettings {
        let section = &self.engine;
        EngineSettings::new()
            .with_drain_timeout(Duration::from_millis(section.drain_timeout_ms))
            .with_shutdown_timeout(Duration::from_millis(section.shutdown_timeout_ms))
            .with_start_timeout(section.start_timeout_ms.map(Duration::from_millis))
            .with_error_channel_capacity(section.error_channel_capacity)
    }

    /// Names of the configured components.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSection {
    /// Delay between the termination signal and component shutdown.
    pub drain_timeout_ms: u64,

    /// Upper bound for each component's shutdown.
    pub shutdown_timeout_ms: u64,

    /// Upper bound for each component's start; unbounded when absent.
    pub start_timeout_ms: Option<u64>,

    /// Capacity of the shared error channel.
    pub error_channel_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 2_000,
            shutdown_timeout_ms: 5_000,
            start_timeout_ms: None,
            error_channel_capacity: 32,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();

        let settings = config.settings();
        assert_eq!(settings.drain_timeout, Duration::from_secs(2));
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(settings.start_timeout, None);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.components.is_empty());
    }

    #[test]
    fn component_tables_stay_raw() {
        let config: EngineConfig = toml::from_str(
            r#"
            [engine]
            drain_timeout_ms = 250
            start_timeout_ms = 1000

            [observability]
            log_format = "json"

            [components.db]
            user = "root"
            port = 3306

            [components.api]
            bind_address = "127.0.0.1:0"
            "#,
        )
        .unwrap();

        let settings = config.settings();
        assert_eq!(settings.drain_timeout, Duration::from_millis(250));
        assert_eq!(settings.start_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.components["db"]["port"].as_integer(), Some(3306));

        let mut names: Vec<_> = config.component_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["api", "db"]);
    }
}
