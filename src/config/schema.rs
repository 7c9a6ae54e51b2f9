//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file; every
//! section has defaults so an empty file (or no file) is a valid starting point.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Public domain suffix; each subdomain maps to `<sub>.onion`.
    pub domain: String,

    /// Upstream transport settings.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Structured JSON audit log.
    pub audit: AuditConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Upstream (SOCKS) transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Proxy every upstream request goes through. `socks5h` resolves names
    /// on the proxy, which `.onion` addresses require.
    pub proxy_url: String,

    /// Largest request body buffered for forwarding.
    pub max_request_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            proxy_url: "socks5h://127.0.0.1:9050".to_string(),
            max_request_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// End-to-end deadline for one proxied request in seconds.
    pub request_secs: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    pub graceful_shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 300,
            graceful_shutdown_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable debug logging.
    pub debug: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Directory receiving `<YYYYMMDD>_log.jsonl` files. Disabled when unset.
    pub json_path: Option<PathBuf>,
}
