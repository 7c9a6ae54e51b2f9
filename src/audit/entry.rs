use std::collections::BTreeMap;

use axum::http::{HeaderMap, Uri};
use serde::{Deserialize, Serialize};

/// Severity attached to every audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Error,
}

/// A single line in the audit log.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditEvent {
    Message(MessageEvent),
    KeyValue(KeyValueEvent),
    Request(Box<RequestSnapshot>),
}

impl AuditEvent {
    /// Free-text event stamped with the current time.
    pub fn message(level: Level, message: impl Into<String>) -> Self {
        AuditEvent::Message(MessageEvent {
            level,
            time: now(),
            message: message.into(),
        })
    }

    /// Keyed event stamped with the current time.
    pub fn key_value(level: Level, key: impl Into<String>, value: AuditValue) -> Self {
        AuditEvent::KeyValue(KeyValueEvent {
            level,
            time: now(),
            key: key.into(),
            value,
        })
    }

    pub fn level(&self) -> Level {
        match self {
            AuditEvent::Message(e) => e.level,
            AuditEvent::KeyValue(e) => e.level,
            AuditEvent::Request(e) => e.level,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageEvent {
    pub level: Level,
    pub time: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValueEvent {
    pub level: Level,
    pub time: i64,
    pub key: String,
    pub value: AuditValue,
}

/// Payload of a keyed event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditValue {
    Text(String),
    Headers(BTreeMap<String, Vec<String>>),
    Url(UrlSnapshot),
}

impl From<&HeaderMap> for AuditValue {
    fn from(headers: &HeaderMap) -> Self {
        AuditValue::Headers(header_snapshot(headers))
    }
}

impl From<&Uri> for AuditValue {
    fn from(uri: &Uri) -> Self {
        AuditValue::Url(UrlSnapshot::from(uri))
    }
}

impl From<String> for AuditValue {
    fn from(value: String) -> Self {
        AuditValue::Text(value)
    }
}

/// Decomposed request URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UrlSnapshot {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub raw_query: String,
}

impl From<&Uri> for UrlSnapshot {
    fn from(uri: &Uri) -> Self {
        Self {
            scheme: uri.scheme_str().unwrap_or_default().to_string(),
            host: uri.authority().map(|a| a.to_string()).unwrap_or_default(),
            path: uri.path().to_string(),
            raw_query: uri.query().unwrap_or_default().to_string(),
        }
    }
}

/// Snapshot of an inbound request as it is about to be proxied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestSnapshot {
    pub level: Level,
    pub time: i64,
    pub message: String,
    pub method: String,
    #[serde(rename = "URL")]
    pub url: UrlSnapshot,
    pub proto: String,
    pub header: BTreeMap<String, Vec<String>>,
    pub content_length: Option<u64>,
    /// Codings listed in `Transfer-Encoding`, outermost last.
    pub transfer_encoding: Vec<String>,
    /// Trailer fields announced by the `Trailer` header; values arrive after the body.
    pub trailer: BTreeMap<String, Vec<String>>,
    pub host: String,
    pub remote_addr: String,
    #[serde(rename = "RequestURI")]
    pub request_uri: String,
}

impl RequestSnapshot {
    /// Capture method, URL, protocol version and headers of `req`.
    pub fn capture<B>(
        level: Level,
        message: impl Into<String>,
        req: &axum::http::Request<B>,
        remote_addr: Option<std::net::SocketAddr>,
    ) -> Self {
        let headers = req.headers();
        Self {
            level,
            time: now(),
            message: message.into(),
            method: req.method().to_string(),
            url: UrlSnapshot::from(req.uri()),
            proto: format!("{:?}", req.version()),
            header: header_snapshot(headers),
            content_length: headers
                .get(axum::http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            transfer_encoding: list_header(headers, axum::http::header::TRANSFER_ENCODING),
            trailer: list_header(headers, axum::http::header::TRAILER)
                .into_iter()
                .map(|name| (name, Vec::new()))
                .collect(),
            host: headers
                .get(axum::http::header::HOST)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default(),
            remote_addr: remote_addr.map(|a| a.to_string()).unwrap_or_default(),
            request_uri: req
                .uri()
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default(),
        }
    }
}

/// Group header values by name, preserving value order.
pub fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}

/// Comma-separated tokens of every `name` header, lowercased.
fn list_header(headers: &HeaderMap, name: axum::http::HeaderName) -> Vec<String> {
    let mut tokens = Vec::new();
    for value in headers.get_all(name) {
        let value = String::from_utf8_lossy(value.as_bytes());
        tokens.extend(
            value
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty()),
        );
    }
    tokens
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
