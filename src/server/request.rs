use crate::ids::RequestId;
use may_minihttp::Request;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Parsed HTTP request data used by the service pipeline.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub request_id: RequestId,
    /// HTTP method (GET, POST, ...)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// Original request target including the query string (proxying)
    pub raw_path: String,
    /// HTTP headers (lowercase keys)
    pub headers: HashMap<String, String>,
    /// Parsed cookies from the Cookie header
    pub cookies: HashMap<String, String>,
    /// Decoded query string parameters
    pub query_params: HashMap<String, String>,
    /// Raw request body, if any
    pub raw_body: Option<String>,
    /// Body parsed as JSON when it is JSON
    pub body: Option<serde_json::Value>,
}

/// Extract cookies from the (lowercased) header map.
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|c| {
            c.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode query parameters from a request target.
pub fn parse_query_params(path: &str) -> HashMap<String, String> {
    if let Some(pos) = path.find('?') {
        let query_str = &path[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Extract everything the pipeline needs from a raw request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let request_id = RequestId::from_header_or_new(headers.get("x-request-id").map(String::as_str));
    let cookies = parse_cookies(&headers);
    let query_params = parse_query_params(&raw_path);

    let raw_body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => Some(body_str),
            _ => None,
        }
    };
    let body = raw_body
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok());

    debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        header_count = headers.len(),
        param_count = query_params.len(),
        has_body = raw_body.is_some(),
        "request parsed"
    );

    ParsedRequest {
        request_id,
        method,
        path,
        raw_path,
        headers,
        cookies,
        query_params,
        raw_body,
        body,
    }
}
