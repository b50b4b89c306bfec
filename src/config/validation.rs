//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (chunk sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `connection.read_chunk_size`.
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

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }

    let connection = &config.connection;
    if connection.read_chunk_size == 0 {
        errors.push(ValidationError::new("connection.read_chunk_size", "must be greater than 0"));
    }
    if connection.write_chunk_size == 0 {
        errors.push(ValidationError::new("connection.write_chunk_size", "must be greater than 0"));
    }
    if connection.spill_threshold < connection.read_chunk_size {
        errors.push(ValidationError::new(
            "connection.spill_threshold",
            format!(
                "must be at least read_chunk_size ({}), got {}",
                connection.read_chunk_size, connection.spill_threshold
            ),
        ));
    }

    if let Some(max) = connection.max_request_bytes() {
        if max < connection.read_chunk_size as u64 {
            errors.push(ValidationError::new(
                "connection.max_request_bytes",
                format!(
                    "must be 0 or at least read_chunk_size ({}), got {}",
                    connection.read_chunk_size, max
                ),
            ));
        }
    }

    let observability = &config.observability;
    if observability.error_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "observability.error_channel_capacity",
            "must be greater than 0",
        ));
    }
    if observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
