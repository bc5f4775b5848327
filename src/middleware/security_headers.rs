use std::time::Duration;

use super::{Middleware, ResponseParts};
use crate::config::SecurityHeadersConfig;
use crate::server::ParsedRequest;

/// Stamps standard browser-hardening headers on every response.
pub struct SecurityHeadersMiddleware {
    hsts: bool,
}

impl SecurityHeadersMiddleware {
    /// `None` when disabled in config.
    pub fn from_config(cfg: &SecurityHeadersConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        Some(Self { hsts: cfg.hsts })
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn after(&self, _req: &ParsedRequest, res: &mut ResponseParts, _latency: Duration) {
        res.set_header("X-Content-Type-Options", "nosniff");
        res.set_header("X-Frame-Options", "DENY");
        if self.hsts {
            res.set_header(
                "Strict-Transport-Security",
                "max-age=31536000; includeSubDomains",
            );
        }
    }
}
