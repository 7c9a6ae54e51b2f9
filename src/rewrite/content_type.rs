//! Content-type gating for body rewriting.

/// MIME types whose bodies are scanned for internal addresses.
pub const REWRITABLE_CONTENT_TYPES: &[&str] = &[
    "text/plain",
    "text/html",
    "text/css",
    "text/javascript",
    "text/xml",
    "application/javascript",
    "application/json",
    "application/ld+json",
    "application/xml",
    "application/rss+xml",
    "application/atom+xml",
    "application/rdf+xml",
];

/// The MIME type portion of a `Content-Type` value (everything before the first `;`).
pub fn mime_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default()
}

/// Whether a `Content-Type` value names a type on the rewrite allow-list.
///
/// Matching is exact on the MIME portion, so `text/html; charset=utf-8`
/// matches but `Text/HTML` or `text/html ` do not.
pub fn is_rewritable(content_type: &str) -> bool {
    contains(REWRITABLE_CONTENT_TYPES, mime_type(content_type))
}

fn contains(list: &[&str], value: &str) -> bool {
    list.iter().any(|item| *item == value)
}
