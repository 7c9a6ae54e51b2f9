//! Upstream response rewriting.
//!
//! # Responsibilities
//! - Replace `.onion` with the public domain in every header name and value
//! - Decide whether the body may be rewritten (downloads and non-text types are left alone)
//! - Transparently gunzip/re-gzip compressed bodies
//! - Substitute delimiter-bounded internal addresses and fix up `Content-Length`
//!
//! # Design Decisions
//! - Only `.onion/`, `.onion"` and `.onion<` are rewritten in bodies. A bare
//!   `.onion` followed by anything else (whitespace, `'`, `)`) stays untouched
//!   so unrelated text is never corrupted.
//! - `Content-Encoding: gzip` is kept; the body leaves gzip-framed as it arrived.
//! - An empty body (HEAD, 304) has nothing to rewrite and is passed through.

use axum::body::Body;
use axum::http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, Response, Uri};
use memchr::memmem::Finder;

use crate::audit::{AuditSink, Level};
use crate::observability::metrics;
use crate::rewrite::content_type::{is_rewritable, mime_type};
use crate::rewrite::sanitize::sanitize;
use crate::rewrite::{gzip, RewriteConfig, ONION_SUFFIX};

/// Errors that abort rewriting of a response.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("could not create gzip reader: {0}")]
    Decompress(std::io::Error),

    #[error("error on reading body: {0}")]
    ReadBody(String),

    #[error("could not gzip body: {0}")]
    Compress(std::io::Error),
}

/// What to do with a response body after the headers were rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPlan {
    /// `Content-Disposition: attachment`.
    SkipDownload,
    /// No `Content-Type` header.
    SkipUnknownType,
    /// Content type outside the allow-list.
    SkipContentType(String),
    /// Rewrite the body, decoding gzip first when `gzip` is set.
    Rewrite { gzip: bool },
}

/// Rewrites upstream responses so internal addresses point at the public domain.
#[derive(Debug, Clone)]
pub struct ResponseRewriter {
    config: RewriteConfig,
    audit: Option<AuditSink>,
    /// `.onion` anywhere, for header names and values.
    header_pattern: Finder<'static>,
    /// `.onion` + delimiter, paired with its replacement.
    body_patterns: Vec<(Finder<'static>, Vec<u8>)>,
}

impl ResponseRewriter {
    pub fn new(config: RewriteConfig) -> Self {
        let body_patterns = ['/', '"', '<']
            .into_iter()
            .map(|delimiter| {
                let needle = format!("{}{}", ONION_SUFFIX, delimiter);
                let replacement = format!("{}{}", config.domain(), delimiter);
                (Finder::new(needle.as_bytes()).into_owned(), replacement.into_bytes())
            })
            .collect();

        Self {
            header_pattern: Finder::new(ONION_SUFFIX.as_bytes()).into_owned(),
            body_patterns,
            config,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Option<AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Rewrite `resp` in place. `request_url` is only used for logging.
    ///
    /// On error the response must not be forwarded; the body may already
    /// have been consumed.
    pub async fn rewrite(&self, resp: &mut Response<Body>, request_url: &Uri) -> Result<(), RewriteError> {
        let url = sanitize(&request_url.to_string());
        self.debug(format!("rewriting response for {} with status {}", url, resp.status().as_u16()));
        tracing::debug!(headers = ?resp.headers(), "upstream response headers");
        if let Some(audit) = &self.audit {
            audit.headers(Level::Debug, "Header", resp.headers());
        }

        *resp.headers_mut() = self.rewrite_headers(resp.headers());

        let gzip = match body_plan(resp.headers()) {
            BodyPlan::Rewrite { gzip } => gzip,
            BodyPlan::SkipDownload => {
                self.debug(format!("{} - detected file download, not attempting to modify body", url));
                return Ok(());
            }
            BodyPlan::SkipUnknownType => {
                self.debug(format!("{} - no content type skipping replace", url));
                return Ok(());
            }
            BodyPlan::SkipContentType(mime) => {
                self.debug(format!("{} - content type is {}, not replacing", url, sanitize(&mime)));
                return Ok(());
            }
        };
        self.debug(format!("{} - found rewritable content type, replacing strings", url));

        let raw = axum::body::to_bytes(std::mem::take(resp.body_mut()), usize::MAX)
            .await
            .map_err(|e| self.fail(RewriteError::ReadBody(e.to_string())))?;
        if raw.is_empty() {
            self.debug(format!("{} - empty body, nothing to replace", url));
            *resp.body_mut() = Body::empty();
            return Ok(());
        }

        let body = if gzip {
            self.debug(format!("{} - detected gzipped body", url));
            gzip::decode(&raw).map_err(|e| self.fail(RewriteError::Decompress(e)))?
        } else {
            raw.to_vec()
        };
        self.debug(format!("{}: Got a {} body len", url, body.len()));

        let mut body = self.rewrite_body(&body);

        if gzip {
            self.debug(format!("{} - re gzipping body", url));
            body = gzip::encode(&body).map_err(|e| self.fail(RewriteError::Compress(e)))?;
        }

        resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        *resp.body_mut() = Body::from(body);
        metrics::record_body_rewrite(gzip);
        Ok(())
    }

    /// Copy of `headers` with `.onion` replaced by the public domain in names and values.
    pub fn rewrite_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let domain = self.config.domain().as_bytes();
        let mut out = HeaderMap::with_capacity(headers.len());

        for (name, value) in headers {
            let name = HeaderName::from_bytes(&replace_all(name.as_str().as_bytes(), &self.header_pattern, domain))
                .unwrap_or_else(|_| name.clone());
            let value = HeaderValue::from_bytes(&replace_all(value.as_bytes(), &self.header_pattern, domain))
                .unwrap_or_else(|_| value.clone());
            out.append(name, value);
        }
        out
    }

    /// Replace delimiter-bounded internal addresses in a decoded body.
    pub fn rewrite_body(&self, body: &[u8]) -> Vec<u8> {
        let mut body = body.to_vec();
        for (pattern, replacement) in &self.body_patterns {
            body = replace_all(&body, pattern, replacement);
        }
        body
    }

    fn debug(&self, message: String) {
        tracing::debug!("{}", message);
        if let Some(audit) = &self.audit {
            audit.debug(message);
        }
    }

    fn fail(&self, err: RewriteError) -> RewriteError {
        tracing::error!(error = %err, "response rewrite failed");
        if let Some(audit) = &self.audit {
            audit.error(err.to_string());
        }
        err
    }
}

/// Decide how to treat the body of a response with (already rewritten) `headers`.
pub fn body_plan(headers: &HeaderMap) -> BodyPlan {
    let download = headers
        .get(CONTENT_DISPOSITION)
        .map(|v| v.as_bytes().starts_with(b"attachment"))
        .unwrap_or(false);
    if download {
        return BodyPlan::SkipDownload;
    }

    let content_type = match headers.get(CONTENT_TYPE) {
        Some(value) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        None => return BodyPlan::SkipUnknownType,
    };
    if !is_rewritable(&content_type) {
        return BodyPlan::SkipContentType(mime_type(&content_type).to_string());
    }

    let gzip = headers
        .get(CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"))
        .unwrap_or(false);
    BodyPlan::Rewrite { gzip }
}

/// Replace every non-overlapping match of `pattern` in `haystack`.
fn replace_all(haystack: &[u8], pattern: &Finder<'_>, replacement: &[u8]) -> Vec<u8> {
    let needle_len = pattern.needle().len();
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = pattern.find(rest) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle_len..];
    }
    out.extend_from_slice(rest);
    out
}
