use std::time::Duration;

use super::{Middleware, ResponseParts};
use crate::config::CorsConfig;
use crate::server::ParsedRequest;

/// CORS middleware: answers preflight OPTIONS directly and stamps CORS
/// headers on every other response.
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_headers: Vec<String>,
    allowed_methods: Vec<String>,
}

impl CorsMiddleware {
    pub fn new(
        allowed_origins: Vec<String>,
        allowed_headers: Vec<String>,
        allowed_methods: Vec<String>,
    ) -> Self {
        Self {
            allowed_origins,
            allowed_headers,
            allowed_methods,
        }
    }

    /// `None` when CORS is disabled in config.
    pub fn from_config(cfg: &CorsConfig) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        Some(Self::new(
            cfg.allowed_origins.clone(),
            cfg.allowed_headers.clone(),
            cfg.allowed_methods.clone(),
        ))
    }

    fn apply_headers(&self, res: &mut ResponseParts) {
        res.set_header(
            "Access-Control-Allow-Origin",
            self.allowed_origins.join(", "),
        );
        res.set_header(
            "Access-Control-Allow-Headers",
            self.allowed_headers.join(", "),
        );
        res.set_header(
            "Access-Control-Allow-Methods",
            self.allowed_methods.join(", "),
        );
    }
}

impl Middleware for CorsMiddleware {
    /// Preflight requests never reach the mock pipeline.
    fn before(&self, req: &ParsedRequest) -> Option<ResponseParts> {
        if req.method == "OPTIONS" {
            let mut res = ResponseParts::new(204, "text/plain", Vec::new());
            self.apply_headers(&mut res);
            Some(res)
        } else {
            None
        }
    }

    fn after(&self, _req: &ParsedRequest, res: &mut ResponseParts, _latency: Duration) {
        self.apply_headers(res);
    }
}
