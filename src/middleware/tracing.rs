use std::time::Duration;

use super::{Middleware, ResponseParts};
use crate::server::ParsedRequest;
use tracing::info;

/// Emits one structured event per completed request and echoes the request
/// id back to the caller.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn after(&self, req: &ParsedRequest, res: &mut ResponseParts, latency: Duration) {
        res.set_header("X-Request-Id", req.request_id.to_string());
        info!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            status = res.status,
            latency_ms = latency.as_millis() as u64,
            "request complete"
        );
    }
}
