//! Command line flags. Every flag can also be supplied through the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "onion-gateway", version, about = "Expose hidden services under a public domain")]
pub struct Cli {
    /// Optional TOML configuration file; flags override its values
    #[arg(short, long, env = "ONION_GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// IP and port to bind to
    #[arg(long, env = "ONION_GATEWAY_HOST")]
    pub host: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "ONION_GATEWAY_DEBUG")]
    pub debug: bool,

    /// Public domain; `<sub>.<domain>` is served from `<sub>.onion`
    #[arg(long, env = "ONION_GATEWAY_DOMAIN")]
    pub domain: Option<String>,

    /// Proxy server upstream requests are sent through
    #[arg(long, env = "ONION_GATEWAY_TOR")]
    pub tor: Option<String>,

    /// How long in-flight requests may finish after a shutdown signal (e.g. 15s, 1m)
    #[arg(long, env = "ONION_GATEWAY_GRACEFUL_TIMEOUT", value_parser = parse_duration)]
    pub graceful_timeout: Option<Duration>,

    /// End-to-end timeout for upstream requests (e.g. 30s, 5m)
    #[arg(long, env = "ONION_GATEWAY_TIMEOUT", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Directory for the JSON audit log files
    #[arg(long, env = "ONION_GATEWAY_JSON_PATH")]
    pub json_path: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "ONION_GATEWAY_METRICS_ADDRESS")]
    pub metrics_address: Option<String>,
}

/// Parse `90`, `90s`, `5m` or `1h`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        (s, 1)
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid duration {:?}: {}", s, e))?;
    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration {:?} is too large", s))
}
