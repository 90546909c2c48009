//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0)
//! - Check that every component section is a table
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Component tables are not interpreted here; their owners validate them
//!   when configured

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let engine = &config.engine;
    if engine.shutdown_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "engine.shutdown_timeout_ms",
            "must be greater than zero",
        ));
    }
    if engine.start_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "engine.start_timeout_ms",
            "must be greater than zero when set",
        ));
    }
    if engine.error_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "engine.error_channel_capacity",
            "must be greater than zero",
        ));
    }

    let observability = &config.observability;
    if observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    for (name, section) in &config.components {
        if name.trim().is_empty() {
            errors.push(ValidationError::new("components", "component name is empty"));
        }
        if !section.is_table() {
            errors.push(ValidationError::new(
                format!("components.{name}"),
                format!("expected a table, found {}", section.type_str()),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
