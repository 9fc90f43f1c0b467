//! HTTP cache control module
//!
//! `ETag` generation, conditional request handling and per-resource cache
//! policies.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One year, the lifetime given to fingerprinted frontend assets
pub const ASSET_MAX_AGE: u32 = 31_536_000;

/// Generate a quoted `ETag` from content, e.g. `"abc123def"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// True when the client's `If-None-Match` names this `ETag` (or `*`),
/// meaning a 304 should be sent.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

/// Cache-Control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Long-lived, never revalidated
    Immutable(u32),
    /// Always revalidate
    NoCache,
}

impl CachePolicy {
    pub fn to_header_value(self) -> String {
        match self {
            Self::Immutable(max_age) => format!("public, max-age={max_age}, immutable"),
            Self::NoCache => "no-cache".to_string(),
        }
    }

    /// Policy for a file served from the frontend directory. HTML documents
    /// must always revalidate so new deployments are picked up; everything
    /// else is a build asset.
    pub fn for_content_type(content_type: &str) -> Self {
        if content_type.starts_with("text/html") {
            Self::NoCache
        } else {
            Self::Immutable(ASSET_MAX_AGE)
        }
    }
}
