use crate::server::ParsedRequest;
use serde_json::Value;
use std::time::Duration;

/// A fully built response, assembled in memory before any byte is written.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseParts {
    pub fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, "application/json", body.to_string().into_bytes())
    }

    /// Add or replace a header (case-insensitive on the name).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Cross-cutting request/response hooks.
///
/// `before` may short-circuit with a finished response (used by CORS
/// preflight); `after` mutates the response on its way out. Middleware must
/// never block or fail a request.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &ParsedRequest) -> Option<ResponseParts> {
        None
    }
    fn after(&self, _req: &ParsedRequest, _res: &mut ResponseParts, _latency: Duration) {}
}
