use super::request::{parse_request, ParsedRequest};
use super::response::write_parts;
use crate::admission::{client_ip, spawn_sweeper, AdmissionController, RateLimitStatus};
use crate::auth::AuthGate;
use crate::cache::{
    fingerprint, ResponseCache, PARAM_DELAY, PARAM_EXAMPLE, PARAM_NOCACHE, PARAM_STATUS,
};
use crate::config::ServerConfig;
use crate::errors::RequestError;
use crate::generator::ValueGenerator;
use crate::hot_reload::ServingState;
use crate::middleware::{
    CorsMiddleware, MetricsMiddleware, Middleware, ResponseParts, SecurityHeadersMiddleware,
    TracingMiddleware,
};
use crate::proxy::ReverseProxy;
use crate::router::Resolution;
use crate::spec::{ResponseSpec, RouteMeta};
use arc_swap::ArcSwap;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use serde_json::{json, Value};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

/// Paths served directly by the core; they bypass admission control and
/// authentication.
pub const BYPASS_PATHS: [&str; 5] = ["/health", "/ready", "/metrics", "/docs", "/openapi.yaml"];

const DOCS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>mimicd</title></head>
<body>
<h1>mimicd</h1>
<p>This server mocks every operation declared in its OpenAPI specification.</p>
<ul>
<li><a href="/openapi.yaml">/openapi.yaml</a> &mdash; the active specification</li>
<li><a href="/health">/health</a> &mdash; liveness</li>
<li><a href="/ready">/ready</a> &mdash; readiness and spec generation</li>
<li><a href="/metrics">/metrics</a> &mdash; Prometheus metrics</li>
</ul>
</body>
</html>
"#;

/// The HTTP service: composes the router, admission controller, auth gate,
/// response cache and value generator on the request path. Cloned per
/// connection; all state is shared through `Arc`s.
#[derive(Clone)]
pub struct AppService {
    pub state: Arc<ArcSwap<ServingState>>,
    pub cache: Arc<ResponseCache>,
    pub metrics: Arc<MetricsMiddleware>,
    auth: Arc<AuthGate>,
    admission: Option<Arc<AdmissionController>>,
    proxy: Option<Arc<ReverseProxy>>,
    generator: Arc<Mutex<ValueGenerator>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    config: Arc<ServerConfig>,
}

impl AppService {
    /// Wire the serving core from a published state and validated config.
    /// Spawns the bucket sweeper when admission control is enabled; the auth
    /// gate spawns its own last-used drainer.
    pub fn new(state: Arc<ArcSwap<ServingState>>, config: ServerConfig) -> anyhow::Result<Self> {
        let metrics = Arc::new(MetricsMiddleware::new());
        let auth = Arc::new(AuthGate::new(&config.auth));

        let admission = AdmissionController::from_config(&config.rate_limit).map(Arc::new);
        if let Some(admission) = &admission {
            spawn_sweeper(
                Arc::clone(admission.store()),
                Duration::from_secs(config.rate_limit.sweep_interval_secs),
            );
        }

        let proxy = if config.proxy.enabled {
            let upstream = config
                .proxy
                .upstream
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("proxy.enabled requires proxy.upstream"))?;
            Some(Arc::new(ReverseProxy::new(
                upstream,
                Duration::from_secs(config.proxy.timeout_secs),
            )?))
        } else {
            None
        };

        let generator = match config.response.seed {
            Some(seed) => ValueGenerator::seeded(seed, config.response.use_field_heuristics),
            None => ValueGenerator::new(config.response.use_field_heuristics),
        };

        let mut middlewares: Vec<Arc<dyn Middleware>> = vec![Arc::clone(&metrics) as Arc<dyn Middleware>];
        if let Some(cors) = CorsMiddleware::from_config(&config.cors) {
            middlewares.push(Arc::new(cors));
        }
        if let Some(headers) = SecurityHeadersMiddleware::from_config(&config.security_headers) {
            middlewares.push(Arc::new(headers));
        }
        middlewares.push(Arc::new(TracingMiddleware));

        Ok(Self {
            state,
            cache: Arc::new(ResponseCache::new()),
            metrics,
            auth,
            admission,
            proxy,
            generator: Arc::new(Mutex::new(generator)),
            middlewares,
            config: Arc::new(config),
        })
    }

    pub fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    fn reserved_endpoint(&self, parsed: &ParsedRequest) -> Option<ResponseParts> {
        if parsed.method != "GET" || !BYPASS_PATHS.contains(&parsed.path.as_str()) {
            return None;
        }
        let parts = match parsed.path.as_str() {
            "/health" => ResponseParts::json(200, &json!({ "status": "ok" })),
            "/ready" => {
                let state = self.state.load();
                ResponseParts::json(
                    200,
                    &json!({
                        "ready": true,
                        "routes": state.table.route_count(),
                        "spec_version": state.version,
                        "spec_hash": state.hash,
                    }),
                )
            }
            "/metrics" => ResponseParts::new(
                200,
                "text/plain; version=0.0.4",
                self.render_metrics().into_bytes(),
            ),
            "/openapi.yaml" => ResponseParts::new(
                200,
                "text/yaml",
                self.state.load().raw_spec.clone().into_bytes(),
            ),
            "/docs" => ResponseParts::new(200, "text/html", DOCS_HTML.as_bytes().to_vec()),
            _ => return None,
        };
        Some(parts)
    }

    fn render_metrics(&self) -> String {
        let bucket_count = self
            .admission
            .as_ref()
            .map(|a| a.store().len())
            .unwrap_or(0);
        format!(
            "# HELP mimicd_requests_total Total number of handled requests\n\
             # TYPE mimicd_requests_total counter\n\
             mimicd_requests_total {}\n\
             # HELP mimicd_request_latency_seconds Average request latency in seconds\n\
             # TYPE mimicd_request_latency_seconds gauge\n\
             mimicd_request_latency_seconds {}\n\
             # HELP mimicd_top_level_requests_total Requests served by reserved endpoints\n\
             # TYPE mimicd_top_level_requests_total counter\n\
             mimicd_top_level_requests_total {}\n\
             # HELP mimicd_auth_failures_total Rejected credentials\n\
             # TYPE mimicd_auth_failures_total counter\n\
             mimicd_auth_failures_total {}\n\
             # HELP mimicd_rate_limited_total Requests rejected by admission control\n\
             # TYPE mimicd_rate_limited_total counter\n\
             mimicd_rate_limited_total {}\n\
             # HELP mimicd_cache_hits_total Response cache hits\n\
             # TYPE mimicd_cache_hits_total counter\n\
             mimicd_cache_hits_total {}\n\
             # HELP mimicd_cache_misses_total Response cache misses\n\
             # TYPE mimicd_cache_misses_total counter\n\
             mimicd_cache_misses_total {}\n\
             # HELP mimicd_proxied_total Requests forwarded to the proxy upstream\n\
             # TYPE mimicd_proxied_total counter\n\
             mimicd_proxied_total {}\n\
             # HELP mimicd_cache_entries Live response cache entries\n\
             # TYPE mimicd_cache_entries gauge\n\
             mimicd_cache_entries {}\n\
             # HELP mimicd_rate_limit_buckets Live token buckets\n\
             # TYPE mimicd_rate_limit_buckets gauge\n\
             mimicd_rate_limit_buckets {}\n",
            self.metrics.request_count(),
            self.metrics.average_latency().as_secs_f64(),
            self.metrics.top_level_request_count(),
            self.metrics.auth_failures(),
            self.metrics.rate_limited(),
            self.metrics.cache_hits(),
            self.metrics.cache_misses(),
            self.metrics.proxied(),
            self.cache.len(),
            bucket_count,
        )
    }

    fn root_info(&self, state: &ServingState) -> ResponseParts {
        ResponseParts::json(
            200,
            &json!({
                "service": state.slug,
                "routes": state.table.route_count(),
                "spec_version": state.version,
                "docs": "/docs",
            }),
        )
    }

    /// Status served for this request: a valid `__status` override wins,
    /// invalid overrides are ignored with a warning.
    fn effective_status(&self, route: &RouteMeta, query: &ParsedRequest) -> u16 {
        if let Some(raw) = query.query_params.get(PARAM_STATUS) {
            match raw.parse::<u16>() {
                Ok(status) if (100..=599).contains(&status) => return status,
                _ => warn!(value = %raw, "invalid status override ignored"),
            }
        }
        route.default_status()
    }

    /// Parsed and clamped `__delay`, if requested.
    fn requested_delay(&self, parsed: &ParsedRequest) -> Option<Duration> {
        let raw = parsed.query_params.get(PARAM_DELAY)?;
        match raw.parse::<u64>() {
            Ok(ms) => Some(Duration::from_millis(ms.min(self.config.response.max_delay_ms))),
            Err(_) => {
                warn!(value = %raw, "invalid delay ignored");
                None
            }
        }
    }

    fn add_rate_limit_headers(parts: &mut ResponseParts, status: RateLimitStatus) {
        parts.set_header("X-RateLimit-Limit", status.limit.to_string());
        parts.set_header("X-RateLimit-Remaining", status.remaining.to_string());
        let reset_at = SystemTime::now() + status.reset;
        let reset_unix = reset_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        parts.set_header("X-RateLimit-Reset", reset_unix.to_string());
    }

    /// Body for one response spec: requested named example → unnamed example
    /// → schema generation → none (declared response without content).
    fn body_from_spec(
        &self,
        state: &ServingState,
        spec: &ResponseSpec,
        example_name: Option<&String>,
    ) -> Option<Value> {
        if let Some(name) = example_name {
            if let Some(named) = spec.named_examples.get(name) {
                return Some(named.clone());
            }
            warn!(example = %name, "named example not found; falling back");
        }
        if let Some(example) = &spec.example {
            return Some(example.clone());
        }
        if let Some(schema) = &spec.schema {
            let mut generator = self.generator.lock().unwrap();
            return Some(generator.generate(schema, &state.components));
        }
        None
    }

    /// Body for the effective status. An undeclared status falls back to
    /// scanning declared 2xx responses before failing.
    fn body_for(
        &self,
        state: &ServingState,
        route: &RouteMeta,
        status: u16,
        example_name: Option<&String>,
    ) -> Result<Option<Value>, RequestError> {
        if route.responses.contains_key(&status) {
            return Ok(route
                .response_for(status)
                .and_then(|spec| self.body_from_spec(state, spec, example_name)));
        }
        for declared in route.declared_statuses() {
            if !(200..300).contains(&declared) {
                continue;
            }
            if let Some(spec) = route.response_for(declared) {
                if let Some(body) = self.body_from_spec(state, spec, example_name) {
                    return Ok(Some(body));
                }
            }
        }
        Err(RequestError::NoExampleForStatus(status))
    }

    fn mock_response(
        &self,
        state: &ServingState,
        route: &RouteMeta,
        method: &Method,
        parsed: &ParsedRequest,
    ) -> Result<ResponseParts, RequestError> {
        // Admission first: a throttled client never reaches auth or
        // generation.
        let api_key = self.auth.extract_key(&parsed.headers, &parsed.query_params);
        let mut rl_status = None;
        if let Some(admission) = &self.admission {
            let ip = client_ip(&parsed.headers);
            match admission.check(api_key.as_deref(), &ip) {
                Ok(status) => rl_status = Some(status),
                Err(status) => return Err(RequestError::RateLimited(status)),
            }
        }

        self.auth.validate(api_key.as_deref())?;

        // Simulated latency rides the request coroutine, so client
        // disconnect cancellation follows coroutine cancellation.
        if let Some(delay) = self.requested_delay(parsed) {
            may::coroutine::sleep(delay);
        }

        let status = self.effective_status(route, parsed);
        let content_type = route
            .content_type_for(status)
            .unwrap_or_else(|| "application/json".to_string());

        let key = fingerprint(
            method,
            &parsed.path,
            status,
            &parsed.query_params,
            parsed.headers.get("authorization").map(String::as_str),
            parsed.headers.get("accept").map(String::as_str),
            parsed.headers.get("content-type").map(String::as_str),
        );

        let cache_read = self.config.cache.enabled
            && !parsed.query_params.contains_key(PARAM_NOCACHE);
        if cache_read {
            if let Some(entry) = self.cache.get(&key) {
                self.metrics.inc_cache_hit();
                let mut parts =
                    ResponseParts::new(entry.status, content_type, entry.body.as_ref().clone());
                if let Some(status) = rl_status {
                    Self::add_rate_limit_headers(&mut parts, status);
                }
                return Ok(parts);
            }
        }
        self.metrics.inc_cache_miss();

        let example_name = parsed.query_params.get(PARAM_EXAMPLE);
        let body = self.body_for(state, route, status, example_name)?;
        let body_bytes = match body {
            Some(value) => serde_json::to_vec(&value)?,
            None => Vec::new(),
        };

        if self.config.cache.enabled {
            self.cache.put(key, status, body_bytes.clone());
        }

        let mut parts = ResponseParts::new(status, content_type, body_bytes);
        if let Some(status) = rl_status {
            Self::add_rate_limit_headers(&mut parts, status);
        }
        Ok(parts)
    }

    fn handle(&self, parsed: &ParsedRequest) -> Result<ResponseParts, RequestError> {
        let method: Method = parsed
            .method
            .parse()
            .map_err(|_| RequestError::RouteNotFound)?;
        let state = self.state.load_full();

        if parsed.path == "/" && method == Method::GET && !state.table.has_path("/") {
            return Ok(self.root_info(&state));
        }

        match state.table.resolve(&method, &parsed.path) {
            Resolution::Route(route) => self.mock_response(&state, &route, &method, parsed),
            Resolution::MethodNotAllowed(allowed) => {
                Err(RequestError::MethodNotAllowed(allowed))
            }
            Resolution::NotFound => {
                if let Some(proxy) = &self.proxy {
                    self.metrics.inc_proxied();
                    let upstream = proxy.forward(
                        &parsed.method,
                        &parsed.raw_path,
                        &parsed.headers,
                        parsed.raw_body.as_deref(),
                    )?;
                    let content_type = upstream
                        .content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    Ok(ResponseParts::new(
                        upstream.status,
                        content_type,
                        upstream.body,
                    ))
                } else {
                    Err(RequestError::RouteNotFound)
                }
            }
        }
    }

    fn error_parts(&self, err: RequestError) -> ResponseParts {
        let mut parts = ResponseParts::json(err.status(), &err.envelope());
        match &err {
            RequestError::MethodNotAllowed(allowed) => {
                let allow = allowed
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                parts.set_header("Allow", allow);
            }
            RequestError::RateLimited(status) => {
                self.metrics.inc_rate_limited();
                Self::add_rate_limit_headers(&mut parts, *status);
                parts.set_header(
                    "Retry-After",
                    status.retry_after.as_secs().max(1).to_string(),
                );
            }
            RequestError::Auth(_) => {
                self.metrics.inc_auth_failure();
            }
            RequestError::Serialization(source) => {
                error!(error = %source, "response serialization failed");
            }
            _ => {}
        }
        parts
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let parsed = parse_request(req);

        // Reserved endpoints bypass admission, auth and middleware.
        if let Some(parts) = self.reserved_endpoint(&parsed) {
            self.metrics.inc_top_level_request();
            write_parts(res, parts);
            return Ok(());
        }

        let mut early: Option<ResponseParts> = None;
        for mw in &self.middlewares {
            if early.is_none() {
                early = mw.before(&parsed);
            } else {
                mw.before(&parsed);
            }
        }

        let mut parts = match early {
            Some(parts) => parts,
            None => self
                .handle(&parsed)
                .unwrap_or_else(|err| self.error_parts(err)),
        };

        let latency = start.elapsed();
        for mw in &self.middlewares {
            mw.after(&parsed, &mut parts, latency);
        }

        write_parts(res, parts);
        Ok(())
    }
}
