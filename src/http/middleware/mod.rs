//! Request middleware run ahead of the proxy handler.

pub mod forwarded;

pub use forwarded::forwarded_headers;
