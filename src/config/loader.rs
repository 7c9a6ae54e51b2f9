//! Configuration loading: defaults → optional TOML file → CLI/env overrides.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML file without validating it.
pub fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration from the CLI (and the file it names), then validate it.
pub fn load_config(cli: &Cli) -> Result<GatewayConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_overrides(&mut config, cli);

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_overrides(config: &mut GatewayConfig, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.listener.bind_address = host.clone();
    }
    if cli.debug {
        config.observability.debug = true;
    }
    if let Some(domain) = &cli.domain {
        config.domain = domain.clone();
    }
    if let Some(tor) = &cli.tor {
        config.upstream.proxy_url = tor.clone();
    }
    if let Some(timeout) = cli.graceful_timeout {
        config.timeouts.graceful_shutdown_secs = timeout.as_secs();
    }
    if let Some(timeout) = cli.timeout {
        config.timeouts.request_secs = timeout.as_secs();
    }
    if let Some(path) = &cli.json_path {
        config.audit.json_path = Some(path.clone());
    }
    if let Some(addr) = &cli.metrics_address {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
domain = "file.example"

[listener]
bind_address = "0.0.0.0:9000"

[timeouts]
request_secs = 60
"#
        )
        .unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            domain: Some("flag.example".into()),
            timeout: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let config = load_config(&cli).unwrap();

        assert_eq!(config.domain, "flag.example");
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.timeouts.request_secs, 120);
        assert_eq!(config.timeouts.graceful_shutdown_secs, 5);
        assert_eq!(config.upstream.proxy_url, "socks5h://127.0.0.1:9050");
    }

    #[test]
    fn test_missing_domain_is_fatal() {
        let err = load_config(&Cli::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e == &[ValidationError::MissingDomain]));
        assert_eq!(err.to_string(), "Validation failed: please provide a domain");
    }

    #[test]
    fn test_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "domain = [").unwrap();

        let err = read_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
