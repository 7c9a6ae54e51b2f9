//! Onion gateway
//!
//! A reverse proxy that serves Tor hidden services on a public domain.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ── GET http://sub.example.org/page ──▶ ┌──────────────────────────────┐
//!                                                   │ http::server                 │
//!                                                   │   forwarded headers          │
//!                                                   │   routing::DomainMatcher     │
//!                                                   │   rewrite::Director          │
//!                                                   └──────────────┬───────────────┘
//!                                                                  │ sub.onion
//!                                                                  ▼
//!                                                   ┌──────────────────────────────┐
//!                                                   │ http::upstream (SOCKS) ──────┼──▶ Tor ──▶ hidden service
//!                                                   └──────────────┬───────────────┘
//!                                                                  │
//!                                                                  ▼
//!     Client ◀── .onion → .example.org ──────────── rewrite::ResponseRewriter
//!
//!     Cross-cutting: config (TOML + CLI/env), observability (tracing, metrics),
//!                    audit (JSON lines), lifecycle (signals, graceful drain)
//! ```

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use onion_gateway::audit::AuditSink;
use onion_gateway::config::{load_config, Cli};
use onion_gateway::lifecycle::{wait_for_signal, Shutdown};
use onion_gateway::observability::{logging, metrics};
use onion_gateway::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("onion-gateway: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(config.observability.debug);
    tracing::info!("onion-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        domain = %config.domain,
        proxy = %config.upstream.proxy_url,
        request_timeout_secs = config.timeouts.request_secs,
        graceful_shutdown_secs = config.timeouts.graceful_shutdown_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (audit, audit_task) = match &config.audit.json_path {
        Some(dir) => {
            let (sink, handle) = AuditSink::start(dir).await?;
            tracing::info!(path = %dir.display(), "Audit log enabled");
            (Some(sink), Some(handle))
        }
        None => (None, None),
    };

    let server = HttpServer::new(config.clone(), audit)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;

    // The writer exits once the last sink clone is dropped. Connections cut off
    // by the drain deadline may still hold one, so the wait is bounded.
    if let Some(handle) = audit_task {
        let grace = Duration::from_secs(config.timeouts.graceful_shutdown_secs.max(1));
        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Audit writer task failed"),
            Err(_) => tracing::warn!("Audit writer did not finish in time"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
