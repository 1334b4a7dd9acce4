//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::status::ErrorPolicy;

pub const DEFAULT_SYNC_INVOKE_MS: i64 = 30_000;
pub const DEFAULT_STREAM_INVOKE_MS: i64 = 60_000;
pub const DEFAULT_BUFFER_SIZE_BYTES: i64 = 4 * 1024;
pub const DEFAULT_MAX_REQUEST_BODY_BYTES: i64 = 512 * 1024 * 1024;
pub const DEFAULT_DIAL_TIMEOUT_MS: i64 = 3_000;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, API prefix).
    pub listener: ListenerConfig,

    /// Backend endpoint list and dial settings.
    pub backend: BackendConfig,

    /// Call deadlines.
    pub timeouts: TimeoutConfig,

    /// Streaming buffer and body limits.
    pub transfer: TransferConfig,

    /// Rendering of backend failures.
    pub errors: ErrorPolicy,

    /// Audit journal of unary calls.
    pub journal: JournalConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path prefix of gateway requests; stripped to get the backend method.
    pub api_prefix: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            api_prefix: "/api/".to_string(),
        }
    }
}

/// Backend endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Ordered `host:port` list. Order matters for change detection.
    pub addresses: Vec<String>,

    /// Per-address dial timeout in milliseconds.
    pub dial_timeout_ms: i64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn dial_timeout(&self) -> Duration {
        millis_or_default(self.dial_timeout_ms, DEFAULT_DIAL_TIMEOUT_MS)
    }
}

/// Timeout configuration. Non-positive values fall back to the defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Unary call deadline in milliseconds.
    pub sync_invoke_ms: i64,

    /// Upload/download stream deadline in milliseconds.
    pub stream_invoke_ms: i64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            sync_invoke_ms: DEFAULT_SYNC_INVOKE_MS,
            stream_invoke_ms: DEFAULT_STREAM_INVOKE_MS,
        }
    }
}

impl TimeoutConfig {
    pub fn sync_invoke(&self) -> Duration {
        millis_or_default(self.sync_invoke_ms, DEFAULT_SYNC_INVOKE_MS)
    }

    pub fn stream_invoke(&self) -> Duration {
        millis_or_default(self.stream_invoke_ms, DEFAULT_STREAM_INVOKE_MS)
    }
}

/// Transfer configuration. Non-positive values fall back to the defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk size for file streaming.
    pub buffer_size_bytes: i64,

    /// Largest accepted request body; also caps backend message size.
    pub max_request_body_bytes: i64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_size_bytes: DEFAULT_BUFFER_SIZE_BYTES,
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
        }
    }
}

impl TransferConfig {
    pub fn buffer_size(&self) -> usize {
        positive_or_default(self.buffer_size_bytes, DEFAULT_BUFFER_SIZE_BYTES)
    }

    pub fn max_request_body(&self) -> usize {
        positive_or_default(self.max_request_body_bytes, DEFAULT_MAX_REQUEST_BODY_BYTES)
    }
}

/// Journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,

    /// Glob patterns (`*` wildcard) over backend method names.
    pub method_patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
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
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

fn positive_or_default(value: i64, default: i64) -> usize {
    let value = if value > 0 { value } else { default };
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn millis_or_default(value: i64, default: i64) -> Duration {
    Duration::from_millis(positive_or_default(value, default) as u64)
}
