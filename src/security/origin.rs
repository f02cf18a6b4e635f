//! Origin allowlist gate for browser-initiated requests.
//!
//! Checks the declared `Origin` (falling back to `Referer`) against a fixed
//! allowlist of `scheme://host[:port]` tuples sourced from configuration.
//! The header is client-supplied, so this is an advisory check; it is always
//! composed with the CSRF gate and never stands alone.

use axum::http::{header, HeaderMap};
use std::collections::HashSet;
use url::Url;

/// Normalize a raw header value down to `scheme://host[:port]`, dropping
/// path, query, and credentials. Returns `None` for anything unparseable.
fn normalize(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

#[derive(Debug, Clone)]
pub struct OriginAllowlist {
    allowed: HashSet<String>,
}

impl OriginAllowlist {
    /// Build an allowlist from configured entries. Entries are normalized
    /// through the same path as inbound headers so `https://shop.example/`
    /// and `https://shop.example` compare equal. Unparseable entries are
    /// dropped with a warning rather than silently allowed.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for entry in entries {
            match normalize(entry.as_ref()) {
                Some(key) => {
                    allowed.insert(key);
                }
                None => {
                    tracing::warn!("Ignoring unparseable allowed origin: {}", entry.as_ref());
                }
            }
        }
        Self { allowed }
    }

    /// Check whether the request declares an allowlisted origin.
    ///
    /// Missing or unparseable headers fail closed.
    pub fn is_allowed(&self, headers: &HeaderMap) -> bool {
        let raw = headers
            .get(header::ORIGIN)
            .or_else(|| headers.get(header::REFERER))
            .and_then(|v| v.to_str().ok());

        match raw.and_then(normalize) {
            Some(key) => self.allowed.contains(&key),
            None => false,
        }
    }
}
