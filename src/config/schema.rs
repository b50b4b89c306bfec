//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DEFAULT_ERROR_CHANNEL_CAPACITY;
use crate::http::codec::WRITE_CHUNK_SIZE;
use crate::net::buffer::DEFAULT_SPILL_THRESHOLD;

/// Default cap on one buffered request.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 8 * 1024 * 1024;

/// Root configuration for the embedded server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, port, connection cap).
    pub listener: ListenerConfig,

    /// Per-connection buffering, deadlines and write policy.
    pub connection: ConnectionConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address or host name to bind (e.g., "0.0.0.0", "::1").
    pub bind_address: String,

    /// TCP port. `0` asks the OS for a free port.
    pub port: u16,

    /// Maximum concurrent connections. `0` means unbounded.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8081,
            max_connections: 0,
        }
    }
}

impl ListenerConfig {
    /// `host:port` form used in logs and error messages.
    pub fn endpoint(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }
}

/// Scope of the lock held while a response body is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteGateMode {
    /// One lock for the whole server: body writes of all connections are serialized.
    Global,
    /// Each connection writes independently.
    #[default]
    PerConnection,
}

/// Per-connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Size of each socket read while buffering a request.
    pub read_chunk_size: usize,

    /// Size of each body chunk written to the socket.
    pub write_chunk_size: usize,

    /// Bytes buffered in memory before spilling to a temporary file.
    pub spill_threshold: usize,

    /// Deadline in seconds for receiving the whole request. `0` disables it.
    pub read_timeout_secs: u64,

    /// Largest request accepted, headers and body together. `0` disables the cap.
    pub max_request_bytes: u64,

    /// Write deadline in seconds. `0` disables it.
    pub write_timeout_secs: u64,

    /// Lock scope for body writes.
    pub write_gate: WriteGateMode,

    /// Answer undecodable requests with `400 Bad Request` instead of closing silently.
    pub strict: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            write_chunk_size: WRITE_CHUNK_SIZE,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            read_timeout_secs: 30,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            write_timeout_secs: 30,
            write_gate: WriteGateMode::default(),
            strict: false,
        }
    }
}

impl ConnectionConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn max_request_bytes(&self) -> Option<u64> {
        (self.max_request_bytes > 0).then_some(self.max_request_bytes)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_secs > 0).then(|| Duration::from_secs(self.write_timeout_secs))
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Install the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Errors held for the host before new ones are dropped.
    pub error_channel_capacity: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
        }
    }
}
