//! Reverse-proxy fallback for paths the spec does not declare.
//!
//! Unmatched requests are forwarded verbatim to the configured upstream,
//! minus hop-by-hop headers, within a bounded timeout propagated from the
//! request. Upstream failures surface as gateway errors (502, or 504 on
//! timeout), never as a generic 500.

use crate::errors::RequestError;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Headers meaningful only for a single transport hop; stripped both ways.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response relayed from the upstream.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

pub struct ReverseProxy {
    upstream: String,
    client: reqwest::blocking::Client,
}

impl ReverseProxy {
    pub fn new(upstream: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            upstream: upstream.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn is_hop_by_hop(name: &str) -> bool {
        HOP_BY_HOP.contains(&name) || name == "host" || name == "content-length"
    }

    /// Forward one request. `path_and_query` is the original request target
    /// (path plus query string); header keys are already lowercased.
    pub fn forward(
        &self,
        method: &str,
        path_and_query: &str,
        headers: &HashMap<String, String>,
        body: Option<&str>,
    ) -> Result<ProxyResponse, RequestError> {
        let url = format!("{}{}", self.upstream, path_and_query);
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| {
            RequestError::ProxyUpstream {
                status: 502,
                message: "unsupported method".to_string(),
            }
        })?;

        let mut request = self.client.request(method, &url);
        for (name, value) in headers {
            if !Self::is_hop_by_hop(name) {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        debug!(url = %url, "forwarding to upstream");
        let response = request.send().map_err(|err| {
            let (status, message) = if err.is_timeout() {
                (504, "upstream timed out".to_string())
            } else {
                (502, "upstream unreachable".to_string())
            };
            warn!(url = %url, error = %err, status, "proxy forward failed");
            RequestError::ProxyUpstream { status, message }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .bytes()
            .map_err(|err| {
                warn!(url = %url, error = %err, "failed reading upstream body");
                RequestError::ProxyUpstream {
                    status: 502,
                    message: "upstream body read failed".to_string(),
                }
            })?
            .to_vec();

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_detection() {
        assert!(ReverseProxy::is_hop_by_hop("connection"));
        assert!(ReverseProxy::is_hop_by_hop("transfer-encoding"));
        assert!(ReverseProxy::is_hop_by_hop("host"));
        assert!(!ReverseProxy::is_hop_by_hop("accept"));
        assert!(!ReverseProxy::is_hop_by_hop("authorization"));
    }

    #[test]
    fn test_unreachable_upstream_is_a_gateway_error() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let proxy =
            ReverseProxy::new("http://192.0.2.1:9", Duration::from_millis(200)).unwrap();
        let err = proxy
            .forward("GET", "/anything", &HashMap::new(), None)
            .unwrap_err();
        match err {
            RequestError::ProxyUpstream { status, .. } => assert!(status == 502 || status == 504),
            other => panic!("expected ProxyUpstream, got {other:?}"),
        }
    }
}
