//! Shared utilities for integration testing.
//!
//! The mock upstream plays the role of the SOCKS proxy slot: the gateway is
//! pointed at it as an `http://` forward proxy, so every upstream request
//! arrives in absolute form (`GET http://sub.onion/path HTTP/1.1`) and can be
//! inspected without a Tor daemon.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use onion_gateway::config::{AuditConfig, GatewayConfig, UpstreamConfig};
use onion_gateway::{HttpServer, Shutdown};

/// A canned upstream answer.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Announced `Content-Length`; defaults to the body length.
    pub declared_length: Option<usize>,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            declared_length: None,
        }
    }

    /// Announce `len` bytes but close the connection after the real body.
    pub fn truncated(mut self, len: usize) -> Self {
        self.declared_length = Some(len);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// One request as seen by the mock proxy.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Start a mock forward proxy answering every request with `response`.
pub async fn start_mock_proxy(response: MockResponse) -> (SocketAddr, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let log = recorded.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let response = response.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, response, log).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorded)
}

async fn handle_connection(mut socket: TcpStream, response: MockResponse, log: Recorded) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
        }
    }

    log.lock().unwrap().push(RecordedRequest {
        request_line,
        headers,
        body,
    });

    let mut out = format!("HTTP/1.1 {} Mock\r\n", response.status);
    for (name, value) in &response.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        response.declared_length.unwrap_or(response.body.len())
    ));

    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&response.body);
    let _ = socket.write_all(&bytes).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}

/// Start a proxy that accepts connections and never answers.
pub async fn start_silent_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// A gateway config for `domain` whose upstream proxy is `proxy`.
pub fn gateway_config(domain: &str, proxy: SocketAddr) -> GatewayConfig {
    GatewayConfig {
        domain: domain.to_string(),
        upstream: UpstreamConfig {
            proxy_url: format!("http://{}", proxy),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A gateway config writing its audit log into `dir`.
pub fn with_audit(mut config: GatewayConfig, dir: PathBuf) -> GatewayConfig {
    config.audit = AuditConfig { json_path: Some(dir) };
    config
}

/// A running gateway.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<()>,
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let audit = match &config.audit.json_path {
        Some(dir) => Some(onion_gateway::audit::AuditSink::start(dir).await.unwrap().0),
        None => None,
    };

    let server = HttpServer::new(config, audit).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    TestGateway { addr, shutdown, task }
}

/// A client that never picks up proxies from the environment and never decompresses.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
