//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and value ranges are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let controller = &config.controller;
    if controller.ingress_class.trim().is_empty() {
        errors.push(ValidationError::new("controller.ingress_class", "must not be empty"));
    }
    if controller.workers == 0 {
        errors.push(ValidationError::new("controller.workers", "must be at least 1"));
    }
    if controller.base_delay_ms > controller.max_delay_ms {
        errors.push(ValidationError::new(
            "controller.base_delay_ms",
            format!("{} exceeds max_delay_ms {}", controller.base_delay_ms, controller.max_delay_ms),
        ));
    }
    if controller.queue_qps == 0 {
        errors.push(ValidationError::new("controller.queue_qps", "must be at least 1"));
    }
    if controller.cache_sync_timeout_secs == 0 {
        errors.push(ValidationError::new("controller.cache_sync_timeout_secs", "must be greater than 0"));
    }

    if config.timeouts.request_secs == Some(0) {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
