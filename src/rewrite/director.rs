//! Inbound request rewriting.
//!
//! # Responsibilities
//! - Map `sub.<public domain>[:port]` to `sub.onion[:port]`
//! - Resolve the upstream scheme (explicit, else inferred from the port)
//! - Drop `X-Forwarded-For` so the client address never reaches the hidden service
//!
//! The host is assumed to end with the public domain; that precondition is
//! checked by the routing layer before the Director runs.

use axum::http::header::{HeaderValue, HOST};
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{HeaderMap, Request};

use crate::audit::{AuditSink, Level};
use crate::rewrite::sanitize::sanitize;
use crate::rewrite::{RewriteConfig, ONION_SUFFIX};
use crate::routing::{is_explicit_port, join_host_port, request_host, split_host_port};

/// Errors raised while rewriting a request.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// The rewritten host is not a valid URI authority or header value.
    #[error("invalid upstream host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Rewrites public-domain requests into internal-address requests.
#[derive(Debug, Clone)]
pub struct Director {
    config: RewriteConfig,
    audit: Option<AuditSink>,
}

impl Director {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config, audit: None }
    }

    /// Mirror the before/after snapshots into the audit log.
    pub fn with_audit(mut self, audit: Option<AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Rewrite `req` in place for dispatch to the hidden service.
    pub fn direct<B>(&self, req: &mut Request<B>) -> Result<(), DirectorError> {
        let raw_host = request_host(req).unwrap_or_default();
        let (host, port) = match split_host_port(&raw_host) {
            Some((host, port)) => (host.to_string(), port.to_string()),
            None => (
                raw_host.clone(),
                req.uri().port_u16().map(|p| p.to_string()).unwrap_or_default(),
            ),
        };

        let upstream_host = self.upstream_host(&host, &port);
        let scheme = match req.uri().scheme_str() {
            Some(scheme) => scheme.to_string(),
            None => infer_scheme(&port).to_string(),
        };

        self.snapshot("before rewrite", &port, req);

        *req.headers_mut() = without_forwarded_for(req.headers());

        let path_and_query = req
            .uri()
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let uri = Uri::builder()
            .scheme(scheme.as_str())
            .authority(upstream_host.as_str())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| DirectorError::InvalidHost {
                host: upstream_host.clone(),
                reason: e.to_string(),
            })?;
        let host_value = HeaderValue::from_str(&upstream_host).map_err(|e| DirectorError::InvalidHost {
            host: upstream_host.clone(),
            reason: e.to_string(),
        })?;

        *req.uri_mut() = uri;
        req.headers_mut().insert(HOST, host_value);

        self.snapshot("after rewrite", &port, req);
        Ok(())
    }

    /// `sub.<domain>` → `sub.onion`, keeping non-default ports.
    fn upstream_host(&self, host: &str, port: &str) -> String {
        let host = host.strip_suffix(self.config.domain()).unwrap_or(host);
        let host = host.strip_suffix('.').unwrap_or(host);
        let host = format!("{}{}", host, ONION_SUFFIX);

        if is_explicit_port(port) {
            join_host_port(&host, port)
        } else {
            host
        }
    }

    fn snapshot<B>(&self, stage: &str, port: &str, req: &Request<B>) {
        let request_uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_default();
        let host = request_host(req).unwrap_or_default();

        tracing::debug!(
            stage,
            port = %sanitize(port),
            url = %sanitize(&req.uri().to_string()),
            request_uri = %sanitize(request_uri),
            host = %sanitize(&host),
            headers = %sanitize(&format!("{:?}", req.headers())),
            "director"
        );

        if let Some(audit) = &self.audit {
            audit.key_value(Level::Debug, "r.port", sanitize(port));
            audit.url(Level::Debug, "r.URL", req.uri());
            audit.key_value(Level::Debug, "r.RequestURI", sanitize(request_uri));
            audit.key_value(Level::Debug, "r.Host", sanitize(&host));
            audit.headers(Level::Debug, "r.Header", req.headers());
        }
    }
}

fn infer_scheme(port: &str) -> &'static str {
    match port {
        "443" => "https",
        _ => "http",
    }
}

fn without_forwarded_for(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if name.as_str() != "x-forwarded-for" {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "onion.gateway";

    fn director() -> Director {
        Director::new(RewriteConfig::new(DOMAIN))
    }

    fn assert_rewritten(req: &Request<()>, host: &str, scheme: &str, port: Option<u16>) {
        assert!(req.headers().get("x-forwarded-for").is_none());
        assert_eq!(req.headers().get(HOST).unwrap(), host);
        assert_eq!(req.uri().authority().unwrap().as_str(), host);
        assert_eq!(req.uri().scheme_str(), Some(scheme));
        assert_eq!(req.uri().port_u16(), port);
    }

    #[test]
    fn test_director_absolute_urls() {
        let cases = [
            (format!("http://asdf.{}/1234", DOMAIN), None, "http", "asdf.onion"),
            (format!("https://asdf.{}/1234", DOMAIN), None, "https", "asdf.onion"),
            (format!("http://asdf.{}:8008/1234", DOMAIN), Some(8008), "http", "asdf.onion:8008"),
            (format!("https://asdf.{}:8008/1234", DOMAIN), Some(8008), "https", "asdf.onion:8008"),
        ];

        for (url, port, scheme, host) in cases {
            let mut req = Request::builder().uri(url.as_str()).body(()).unwrap();
            director().direct(&mut req).unwrap();
            assert_rewritten(&req, host, scheme, port);
            assert_eq!(req.uri().path(), "/1234");
        }
    }

    #[test]
    fn test_director_web_requests() {
        let cases = [
            (format!("asdf.{}", DOMAIN), None, "http", "asdf.onion"),
            (format!("asdf.{}:8008", DOMAIN), Some(8008), "http", "asdf.onion:8008"),
            (format!("asdf.{}:80", DOMAIN), None, "http", "asdf.onion"),
            (format!("asdf.{}:443", DOMAIN), None, "https", "asdf.onion"),
        ];

        for (host_header, port, scheme, host) in cases {
            let mut req = Request::builder()
                .uri("/1234?q=1")
                .header(HOST, host_header.as_str())
                .body(())
                .unwrap();
            director().direct(&mut req).unwrap();
            assert_rewritten(&req, host, scheme, port);
            assert_eq!(req.uri().path_and_query().unwrap().as_str(), "/1234?q=1");
        }
    }

    #[test]
    fn test_director_strips_forwarded_for() {
        let mut req = Request::builder()
            .uri("/")
            .header(HOST, "asdf.example.org")
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-forwarded-for", "10.0.0.1")
            .header("accept", "text/html")
            .body(())
            .unwrap();

        Director::new(RewriteConfig::new(".example.org"))
            .direct(&mut req)
            .unwrap();

        assert!(req.headers().get_all("x-forwarded-for").iter().next().is_none());
        assert_eq!(req.headers().get("accept").unwrap(), "text/html");
        assert_eq!(req.uri().to_string(), "http://asdf.onion/");
    }

    #[test]
    fn test_director_nested_subdomain() {
        let mut req = Request::builder()
            .uri("/")
            .header(HOST, "www.asdf.example.org")
            .body(())
            .unwrap();

        Director::new(RewriteConfig::new("example.org"))
            .direct(&mut req)
            .unwrap();

        assert_eq!(req.headers().get(HOST).unwrap(), "www.asdf.onion");
    }
}
