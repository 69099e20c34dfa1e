//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Check that enabled features have what they need
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DevServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DevServerConfig;

/// A single semantic configuration problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {field} `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("watch is enabled but watch.paths is empty")]
    NoWatchPaths,

    #[error("hot_middleware_options.path must start with `/` (found `{0}`)")]
    RelativeHotPath(String),

    #[error("hot_middleware_options.heartbeat_ms must be greater than zero")]
    ZeroHeartbeat,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DevServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.watch.enabled && config.watch.paths.is_empty() {
        errors.push(ValidationError::NoWatchPaths);
    }

    let hot_path = &config.plugin.hot_middleware_options.path;
    if !hot_path.starts_with('/') {
        errors.push(ValidationError::RelativeHotPath(hot_path.clone()));
    }

    if config.plugin.hot_middleware_options.heartbeat_ms == 0 {
        errors.push(ValidationError::ZeroHeartbeat);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
