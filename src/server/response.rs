use crate::middleware::ResponseParts;
use may_minihttp::Response;
use serde_json::Value;

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}

/// Write a fully assembled response. The body was built in memory before
/// this point, so a failure can never leave a partial body on the wire.
pub fn write_parts(res: &mut Response, parts: ResponseParts) {
    res.status_code(parts.status as usize, status_reason(parts.status));
    let content_type = format!("Content-Type: {}", parts.content_type).into_boxed_str();
    res.header(Box::leak(content_type));
    for (name, value) in &parts.headers {
        let header = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(header));
    }
    res.body_vec(parts.body);
}

pub fn write_json_error(res: &mut Response, status: u16, body: Value) {
    write_parts(res, ResponseParts::json(status, &body));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(429), "Too Many Requests");
        assert_eq!(status_reason(504), "Gateway Timeout");
        assert_eq!(status_reason(299), "OK");
    }
}
