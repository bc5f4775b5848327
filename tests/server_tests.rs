use arc_swap::ArcSwap;
use mimicd::config::{ApiKeyEntry, RateLimitConfig, ServerConfig};
use mimicd::hot_reload::ServingState;
use mimicd::server::{AppService, HttpServer, ServerHandle};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod common;
use common::temp_files;

const SPEC: &str = r#"
openapi: 3.1.0
info:
  title: Server Test
  version: "1.0"
paths:
  /pets:
    get:
      operationId: list_pets
      responses:
        '200':
          description: OK
          content:
            application/json:
              schema:
                type: object
                properties:
                  id: { type: integer, minimum: 1, maximum: 100 }
                  name: { type: string }
        '404':
          description: Missing
    post:
      operationId: add_pet
      responses:
        '201': { description: Created }
  /widgets:
    get:
      operationId: get_widget
      responses:
        '200':
          description: OK
          content:
            application/json:
              examples:
                small:
                  value: { "size": "small" }
                large:
                  value: { "size": "large" }
"#;

struct TestServer {
    handle: Option<ServerHandle>,
    service: AppService,
    base: String,
    spec_path: PathBuf,
}

impl TestServer {
    fn start(config: ServerConfig, port: u16) -> Self {
        let spec_path = temp_files::create_temp_yaml(SPEC);
        let state = Arc::new(ArcSwap::from_pointee(
            ServingState::from_file(&spec_path).unwrap(),
        ));
        let service = AppService::new(state, config).unwrap();
        let addr = format!("127.0.0.1:{port}");
        let handle = HttpServer(service.clone()).start(&addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            handle: Some(handle),
            service,
            base: format!("http://{addr}"),
            spec_path,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
        let _ = std::fs::remove_file(&self.spec_path);
    }
}

fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::new()
}

#[test]
fn test_mock_endpoint_serves_schema_shaped_body() {
    let server = TestServer::start(ServerConfig::default(), 48121);
    let res = client().get(server.url("/pets")).send().unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert!(res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = res.json().unwrap();
    let id = body["id"].as_i64().unwrap();
    assert!((1..=100).contains(&id));
    assert!(body["name"].is_string());
}

#[test]
fn test_undefined_method_gets_405_with_allow() {
    let server = TestServer::start(ServerConfig::default(), 48122);
    let res = client().delete(server.url("/pets")).send().unwrap();
    assert_eq!(res.status().as_u16(), 405);
    assert_eq!(
        res.headers().get("allow").unwrap().to_str().unwrap(),
        "GET, POST"
    );
    let body: Value = res.json().unwrap();
    assert_eq!(body["code"], "method_not_allowed");
}

#[test]
fn test_unknown_path_gets_404_envelope() {
    let server = TestServer::start(ServerConfig::default(), 48123);
    let res = client().get(server.url("/missing")).send().unwrap();
    assert_eq!(res.status().as_u16(), 404);
    let body: Value = res.json().unwrap();
    assert_eq!(body["code"], "route_not_found");
    assert!(body["message"].as_str().is_some());
}

#[test]
fn test_auth_gate_and_bypass_paths() {
    let mut config = ServerConfig::default();
    config.auth.enabled = true;
    config.auth.keys.push(ApiKeyEntry {
        key: "test123".to_string(),
        name: "ci".to_string(),
        enabled: true,
        expires_at: None,
        metadata: HashMap::new(),
    });
    let server = TestServer::start(config, 48124);

    // Health bypasses the gate entirely.
    let health = client().get(server.url("/health")).send().unwrap();
    assert_eq!(health.status().as_u16(), 200);

    // Mock endpoints do not.
    let denied = client().get(server.url("/pets")).send().unwrap();
    assert_eq!(denied.status().as_u16(), 401);
    let body: Value = denied.json().unwrap();
    assert_eq!(body["code"], "auth_missing");

    let wrong = client()
        .get(server.url("/pets"))
        .header("x-api-key", "nope")
        .send()
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);
    let body: Value = wrong.json().unwrap();
    assert_eq!(body["code"], "auth_invalid");

    let ok = client()
        .get(server.url("/pets"))
        .header("x-api-key", "test123")
        .send()
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert!(ok.headers().get("x-request-id").is_some());
}

#[test]
fn test_status_override_valid_and_invalid() {
    let server = TestServer::start(ServerConfig::default(), 48125);

    // Declared 404 has no content: status honored, empty body.
    let overridden = client().get(server.url("/pets?__status=404")).send().unwrap();
    assert_eq!(overridden.status().as_u16(), 404);
    assert!(overridden.bytes().unwrap().is_empty());

    // Out-of-range override is ignored with the default status served.
    let ignored = client().get(server.url("/pets?__status=999")).send().unwrap();
    assert_eq!(ignored.status().as_u16(), 200);
}

#[test]
fn test_rate_limit_rejection_headers() {
    let mut config = ServerConfig::default();
    config.rate_limit = RateLimitConfig {
        enabled: true,
        requests_per_second: 0.2,
        burst: 2,
        ..RateLimitConfig::default()
    };
    let server = TestServer::start(config, 48126);

    let first = client().get(server.url("/pets")).send().unwrap();
    assert_eq!(first.status().as_u16(), 200);
    assert!(first.headers().get("x-ratelimit-limit").is_some());

    let second = client().get(server.url("/pets")).send().unwrap();
    assert_eq!(second.status().as_u16(), 200);

    let third = client().get(server.url("/pets")).send().unwrap();
    assert_eq!(third.status().as_u16(), 429);
    assert_eq!(
        third.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    let retry_after: u64 = third
        .headers()
        .get("retry-after")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    let body: Value = third.json().unwrap();
    assert_eq!(body["code"], "rate_limited");
}

#[test]
fn test_identical_requests_are_served_from_cache() {
    let server = TestServer::start(ServerConfig::default(), 48127);
    let a = client().get(server.url("/pets?x=1&y=2")).send().unwrap().bytes().unwrap();
    // Same fingerprint despite flipped parameter order.
    let b = client().get(server.url("/pets?y=2&x=1")).send().unwrap().bytes().unwrap();
    assert_eq!(a, b);
    assert!(server.service.metrics.cache_hits() >= 1);
}

#[test]
fn test_named_example_selector() {
    let server = TestServer::start(ServerConfig::default(), 48128);

    let small: Value = client()
        .get(server.url("/widgets?__example=small"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(small["size"], "small");

    let large: Value = client()
        .get(server.url("/widgets?__example=large"))
        .send()
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(large["size"], "large");
}

#[test]
fn test_root_fallback_and_reserved_endpoints() {
    let server = TestServer::start(ServerConfig::default(), 48129);

    let root: Value = client().get(server.url("/")).send().unwrap().json().unwrap();
    assert_eq!(root["service"], "server_test");
    assert_eq!(root["routes"], 3);

    let ready: Value = client().get(server.url("/ready")).send().unwrap().json().unwrap();
    assert_eq!(ready["ready"], true);
    assert_eq!(ready["spec_version"], 1);

    let metrics = client().get(server.url("/metrics")).send().unwrap().text().unwrap();
    assert!(metrics.contains("mimicd_requests_total"));

    let spec = client().get(server.url("/openapi.yaml")).send().unwrap().text().unwrap();
    assert!(spec.contains("openapi: 3.1.0"));
}

#[test]
fn test_cors_preflight() {
    let mut config = ServerConfig::default();
    config.cors.enabled = true;
    let server = TestServer::start(config, 48130);

    let res = client()
        .request(reqwest::Method::OPTIONS, server.url("/pets"))
        .send()
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );
}
