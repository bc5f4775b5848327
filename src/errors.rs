//! Per-request error taxonomy.
//!
//! Startup failures (bad spec, bad config) stay on `anyhow` and abort the
//! process before serving begins. Everything that can go wrong *inside* a
//! request maps to one [`RequestError`] variant, which carries its HTTP
//! status, a machine-readable code and a JSON envelope. Bodies are fully
//! constructed in memory before a byte is written, so a failing request can
//! never emit a partial body.

use crate::admission::RateLimitStatus;
use crate::auth::AuthError;
use http::Method;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("route not found")]
    RouteNotFound,
    #[error("method not allowed")]
    MethodNotAllowed(Vec<Method>),
    #[error("no example declared for status {0}")]
    NoExampleForStatus(u16),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("rate limit exceeded")]
    RateLimited(RateLimitStatus),
    #[error("upstream proxy failure: {message}")]
    ProxyUpstream { status: u16, message: String },
    #[error("response serialization failed")]
    Serialization(#[from] serde_json::Error),
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::RouteNotFound => 404,
            RequestError::MethodNotAllowed(_) => 405,
            RequestError::NoExampleForStatus(_) => 404,
            RequestError::Auth(_) => 401,
            RequestError::RateLimited(_) => 429,
            RequestError::ProxyUpstream { status, .. } => *status,
            RequestError::Serialization(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RequestError::RouteNotFound => "route_not_found",
            RequestError::MethodNotAllowed(_) => "method_not_allowed",
            RequestError::NoExampleForStatus(_) => "no_example_for_status",
            RequestError::Auth(err) => err.code(),
            RequestError::RateLimited(_) => "rate_limited",
            RequestError::ProxyUpstream { .. } => "proxy_upstream",
            RequestError::Serialization(_) => "serialization",
        }
    }

    /// The structured body sent to the caller. Serialization failures get a
    /// generic message — details are logged server-side, never leaked.
    pub fn envelope(&self) -> Value {
        let message = match self {
            RequestError::Serialization(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        json!({
            "error": reason_phrase(self.status()),
            "code": self.code(),
            "message": message,
        })
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        502 => "Bad Gateway",
        504 => "Gateway Timeout",
        _ => "Internal Server Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(RequestError::RouteNotFound.status(), 404);
        assert_eq!(RequestError::MethodNotAllowed(vec![Method::GET]).status(), 405);
        assert_eq!(RequestError::Auth(AuthError::Expired).status(), 401);
        assert_eq!(
            RequestError::ProxyUpstream {
                status: 504,
                message: "timed out".to_string()
            }
            .status(),
            504
        );
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = RequestError::Auth(AuthError::Disabled).envelope();
        assert_eq!(envelope["code"], "auth_disabled");
        assert_eq!(envelope["error"], "Unauthorized");
        assert!(envelope["message"].as_str().is_some());
    }

    #[test]
    fn test_serialization_message_is_generic() {
        let err: serde_json::Error = serde_json::from_str::<Value>("{").unwrap_err();
        let envelope = RequestError::Serialization(err).envelope();
        assert_eq!(envelope["message"], "internal error");
    }
}
