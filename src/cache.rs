//! Response cache keyed by request fingerprint.
//!
//! A fingerprint identifies cacheable-equivalent requests: method, path and
//! the *effective* status code, plus sorted query parameters (internal `__`
//! control parameters excluded), a digest of the Authorization header, and
//! the content-negotiation headers when present. Entries have no TTL and no
//! per-entry eviction; the cache is cleared wholesale when the spec is
//! reloaded. Concurrent identical requests may each regenerate and overwrite
//! the same entry — last write wins.

use dashmap::DashMap;
use http::Method;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Query parameters that steer the mock server itself.
pub const PARAM_STATUS: &str = "__status";
pub const PARAM_EXAMPLE: &str = "__example";
pub const PARAM_DELAY: &str = "__delay";
pub const PARAM_NOCACHE: &str = "__nocache";

/// Control parameters excluded from fingerprints. The status override is
/// excluded because the *effective* status is already a first-class key
/// component; delay and cache busting never change the body. The example
/// selector stays in the key — different named examples are different
/// bodies.
pub fn is_internal_param(name: &str) -> bool {
    matches!(name, PARAM_STATUS | PARAM_DELAY | PARAM_NOCACHE)
}

/// First 16 hex characters of SHA-256. Used for the Authorization component
/// of fingerprints (never the raw credential) and for bucket identifiers.
pub fn digest16(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    digest.chars().take(16).collect()
}

/// Build the cache fingerprint for a request.
///
/// Query parameters are sorted so `?b=2&a=1` and `?a=1&b=2` collapse to the
/// same key; the effective status code is always a first-class component.
pub fn fingerprint(
    method: &Method,
    path: &str,
    status: u16,
    query: &HashMap<String, String>,
    authorization: Option<&str>,
    accept: Option<&str>,
    content_type: Option<&str>,
) -> String {
    let mut key = format!("{method}:{path}:{status}");

    let mut params: Vec<(&str, &str)> = query
        .iter()
        .filter(|(name, _)| !is_internal_param(name))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    if !params.is_empty() {
        params.sort_unstable();
        let joined = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        key.push(':');
        key.push_str(&joined);
    }

    if let Some(auth) = authorization {
        key.push_str(":auth=");
        key.push_str(&digest16(auth));
    }
    if let Some(accept) = accept {
        key.push_str(":accept=");
        key.push_str(accept);
    }
    if let Some(ct) = content_type {
        key.push_str(":ct=");
        key.push_str(ct);
    }
    key
}

/// A cached mock response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    /// Fully serialized body; shared so hits never copy the payload.
    pub body: Arc<Vec<u8>>,
}

/// Concurrent fingerprint → response map. Many readers and writers operate
/// without a global lock; `clear` is the only bulk operation.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn put(&self, key: String, status: u16, body: Vec<u8>) {
        self.entries.insert(
            key,
            CacheEntry {
                status,
                body: Arc::new(body),
            },
        );
    }

    /// Drop every entry. Called as part of spec hot reload so stale bodies
    /// for changed or removed routes are never served.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
