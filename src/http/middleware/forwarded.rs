//! Front-proxy header handling.
//!
//! When the gateway runs behind a TLS terminator, the terminator reports the
//! public port and scheme in `X-Forwarded-Port` / `X-Forwarded-Proto`. Those
//! values are folded into the request's Host and URI so the Director infers
//! the right upstream port and scheme, and the headers are dropped together
//! with `X-Real-IP`.

use axum::body::Body;
use axum::http::header::{HeaderValue, HOST};
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::routing::{is_explicit_port, join_host_port, split_host_port};

pub async fn forwarded_headers(mut req: Request<Body>, next: Next) -> Response {
    apply_forwarded_headers(&mut req);
    next.run(req).await
}

/// Fold `X-Forwarded-Port`/`X-Forwarded-Proto` into `req` and drop them along with `X-Real-IP`.
pub fn apply_forwarded_headers<B>(req: &mut Request<B>) {
    let mut forwarded_port = None;
    let mut forwarded_proto = None;
    let mut headers = HeaderMap::with_capacity(req.headers().len());

    for (name, value) in req.headers() {
        match name.as_str() {
            "x-real-ip" => {}
            "x-forwarded-port" => {
                forwarded_port.get_or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
            }
            "x-forwarded-proto" => {
                forwarded_proto.get_or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
            }
            _ => {
                headers.append(name.clone(), value.clone());
            }
        }
    }
    *req.headers_mut() = headers;

    if let Some(port) = forwarded_port {
        apply_port(req, port.trim());
    }
    if let Some(proto) = forwarded_proto {
        apply_scheme(req, proto.trim());
    }
}

fn with_port(hostport: &str, port: &str) -> String {
    let host = split_host_port(hostport).map(|(h, _)| h).unwrap_or(hostport);
    if is_explicit_port(port) {
        join_host_port(host, port)
    } else {
        host.to_string()
    }
}

fn apply_port<B>(req: &mut Request<B>, port: &str) {
    if let Some(authority) = req.uri().authority() {
        let rewritten = with_port(authority.as_str(), port);
        match rewritten.parse::<Authority>() {
            Ok(authority) => {
                let mut parts = req.uri().clone().into_parts();
                parts.authority = Some(authority);
                if let Ok(uri) = Uri::from_parts(parts) {
                    *req.uri_mut() = uri;
                }
            }
            Err(e) => tracing::debug!(error = %e, "ignoring X-Forwarded-Port for URI"),
        }
    }

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| with_port(h, port));
    if let Some(host) = host {
        match HeaderValue::from_str(&host) {
            Ok(value) => {
                req.headers_mut().insert(HOST, value);
            }
            Err(e) => tracing::debug!(error = %e, "ignoring X-Forwarded-Port for Host"),
        }
    }
}

fn apply_scheme<B>(req: &mut Request<B>, proto: &str) {
    let scheme = match proto.parse::<Scheme>() {
        Ok(scheme) => scheme,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring invalid X-Forwarded-Proto");
            return;
        }
    };

    let authority = req.uri().authority().cloned().or_else(|| {
        req.headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.parse::<Authority>().ok())
    });
    let Some(authority) = authority else {
        tracing::debug!("ignoring X-Forwarded-Proto without a host");
        return;
    };

    let mut parts = req.uri().clone().into_parts();
    parts.scheme = Some(scheme);
    parts.authority = Some(authority);
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    match Uri::from_parts(parts) {
        Ok(uri) => *req.uri_mut() = uri,
        Err(e) => tracing::debug!(error = %e, "ignoring X-Forwarded-Proto"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{Director, RewriteConfig};

    fn request(host: &str, headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/path?x=1").header(HOST, host);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_real_ip_dropped() {
        let mut req = request("asdf.example.org", &[("x-real-ip", "203.0.113.7"), ("accept", "*/*")]);
        apply_forwarded_headers(&mut req);

        assert!(req.headers().get("x-real-ip").is_none());
        assert_eq!(req.headers()["accept"], "*/*");
    }

    #[test]
    fn test_forwarded_port() {
        let mut req = request("asdf.example.org", &[("x-forwarded-port", "8008")]);
        apply_forwarded_headers(&mut req);
        assert_eq!(req.headers()[HOST], "asdf.example.org:8008");
        assert!(req.headers().get("x-forwarded-port").is_none());

        let mut req = request("asdf.example.org:8080", &[("x-forwarded-port", "443")]);
        apply_forwarded_headers(&mut req);
        assert_eq!(req.headers()[HOST], "asdf.example.org");

        let mut req = request("asdf.example.org", &[("x-forwarded-port", "80")]);
        apply_forwarded_headers(&mut req);
        assert_eq!(req.headers()[HOST], "asdf.example.org");
    }

    #[test]
    fn test_forwarded_proto() {
        let mut req = request("asdf.example.org", &[("x-forwarded-proto", "https")]);
        apply_forwarded_headers(&mut req);

        assert_eq!(req.uri().to_string(), "https://asdf.example.org/path?x=1");
        assert!(req.headers().get("x-forwarded-proto").is_none());
    }

    #[test]
    fn test_terminated_tls_reaches_director() {
        let mut req = request(
            "asdf.example.org:8080",
            &[("x-forwarded-port", "443"), ("x-forwarded-proto", "https")],
        );
        apply_forwarded_headers(&mut req);
        Director::new(RewriteConfig::new("example.org")).direct(&mut req).unwrap();

        assert_eq!(req.uri().to_string(), "https://asdf.onion/path?x=1");
        assert_eq!(req.headers()[HOST], "asdf.onion");
    }
}
