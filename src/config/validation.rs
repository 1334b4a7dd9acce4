//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the API prefix
//! - Require an admin key when the admin API is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Numeric knobs are never rejected; non-positive values fall back to defaults

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

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

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    let prefix = &config.listener.api_prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') || prefix.len() < 2 {
        errors.push(ValidationError::new(
            "listener.api_prefix",
            format!("must start and end with '/' and not be the root, got {prefix:?}"),
        ));
    }

    for (i, address) in config.backend.addresses.iter().enumerate() {
        if let Err(message) = validate_endpoint_address(address) {
            errors.push(ValidationError::new(format!("backend.addresses[{i}]"), message));
        }
    }

    for (i, pattern) in config.journal.method_patterns.iter().enumerate() {
        if pattern.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("journal.method_patterns[{i}]"),
                "pattern must not be empty",
            ));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new(
                "admin.api_key",
                "required when the admin API is enabled",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a numeric port. Shared with the admin endpoint push.
pub fn validate_endpoint_address(address: &str) -> Result<(), String> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(format!("{address:?} is not host:port"));
    };
    if host.is_empty() {
        return Err(format!("{address:?} has an empty host"));
    }
    if port.parse::<u16>().is_err() {
        return Err(format!("{address:?} has an invalid port"));
    }
    Ok(())
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("{value:?} is not a valid socket address"),
        ));
    }
}
