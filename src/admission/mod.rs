//! Layered token-bucket admission control.
//!
//! Requests pass through an onion of scopes from most to least specific:
//! per-API-key (when a key accompanied the request), per-client-IP, then
//! global. An inner denial short-circuits the outer checks, so a throttled
//! key never consumes IP or global tokens. Buckets live in a bounded LRU
//! store swept by a background coroutine; see [`store::BucketStore`].

mod bucket;
mod store;

pub use bucket::{RateLimitStatus, TokenBucket};
pub use store::{spawn_sweeper, BucketStore};

use crate::cache::digest16;
use crate::config::{LimitParams, RateLimitConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Identifier for the process-wide bucket.
const GLOBAL_ID: &str = "global";

/// Resolve the client identity used for the IP scope.
///
/// Precedence: first `X-Forwarded-For` entry, then `X-Real-IP`, then a fixed
/// placeholder (the transport does not expose the socket peer; unproxied
/// clients share one bucket). Header keys are lowercased by the parser.
pub fn client_ip(headers: &HashMap<String, String>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "local".to_string()
}

/// Layered admission controller. Constructed once from config; every scope
/// shares the same bounded bucket store.
pub struct AdmissionController {
    global: LimitParams,
    per_ip: Option<LimitParams>,
    per_key: Option<LimitParams>,
    store: Arc<BucketStore>,
}

impl AdmissionController {
    /// Build from configuration; `None` when rate limiting is disabled.
    pub fn from_config(cfg: &RateLimitConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        Some(Self {
            global: LimitParams {
                requests_per_second: cfg.requests_per_second,
                burst: cfg.burst,
            },
            per_ip: cfg.per_ip,
            per_key: cfg.per_key,
            store: Arc::new(BucketStore::new(
                cfg.max_buckets,
                Duration::from_secs(cfg.bucket_idle_secs),
            )),
        })
    }

    pub fn store(&self) -> &Arc<BucketStore> {
        &self.store
    }

    /// Check one scope; `Ok` carries the bucket status for header
    /// population, `Err` means the scope denied the request.
    fn check_scope(&self, id: &str, params: LimitParams) -> Result<RateLimitStatus, RateLimitStatus> {
        let bucket = self
            .store
            .get_or_create(id, params.requests_per_second, params.burst);
        if bucket.allow() {
            Ok(bucket.status())
        } else {
            Err(bucket.status())
        }
    }

    /// Run the layered check. Returns the status of the innermost scope that
    /// applied (for response headers) or the status of the scope that denied.
    pub fn check(
        &self,
        api_key: Option<&str>,
        ip: &str,
    ) -> Result<RateLimitStatus, RateLimitStatus> {
        let mut innermost: Option<RateLimitStatus> = None;

        if let (Some(params), Some(key)) = (self.per_key, api_key) {
            let id = format!("key:{}", digest16(key));
            match self.check_scope(&id, params) {
                Ok(status) => innermost = Some(status),
                Err(status) => {
                    warn!(scope = "key", "rate limit exceeded");
                    return Err(status);
                }
            }
        }

        if let Some(params) = self.per_ip {
            let id = format!("ip:{ip}");
            match self.check_scope(&id, params) {
                Ok(status) => {
                    if innermost.is_none() {
                        innermost = Some(status);
                    }
                }
                Err(status) => {
                    warn!(scope = "ip", ip = %ip, "rate limit exceeded");
                    return Err(status);
                }
            }
        }

        match self.check_scope(GLOBAL_ID, self.global) {
            Ok(status) => Ok(innermost.unwrap_or(status)),
            Err(status) => {
                warn!(scope = "global", "rate limit exceeded");
                Err(status)
            }
        }
    }
}
