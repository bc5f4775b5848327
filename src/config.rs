//! Server configuration.
//!
//! A single YAML document loaded once at startup and treated read-only from
//! then on. The serving core never re-validates it after [`ServerConfig::validate`]
//! passes; hot reload swaps the OpenAPI spec, not the configuration.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level configuration for a `mimicd` instance.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub response: ResponseConfig,
    pub proxy: ProxyConfig,
    pub cors: CorsConfig,
    pub security_headers: SecurityHeadersConfig,
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let cfg: ServerConfig = serde_yaml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate cross-field constraints. Failures abort startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.proxy.enabled && self.proxy.upstream.is_none() {
            anyhow::bail!("proxy.enabled requires proxy.upstream");
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_second <= 0.0 {
            anyhow::bail!("rate_limit.requests_per_second must be positive");
        }
        if self.rate_limit.enabled && self.rate_limit.burst == 0 {
            anyhow::bail!("rate_limit.burst must be at least 1");
        }
        if self.rate_limit.max_buckets == 0 {
            anyhow::bail!("rate_limit.max_buckets must be at least 1");
        }
        if let Some(tls) = &self.server.tls {
            if !tls.cert_file.exists() || !tls.key_file.exists() {
                anyhow::bail!("tls cert_file/key_file must exist");
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    /// Certificate paths handed to the TLS-terminating listener wrapper.
    /// Certificate loading itself lives outside the serving core.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// API key authentication. Disabled by default; when disabled every request
/// is accepted without credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Header checked first for the key.
    pub header_name: String,
    /// Query parameter checked second.
    pub query_param: String,
    pub keys: Vec<ApiKeyEntry>,
    /// Bound on the queued last-used-at updates; excess updates are shed.
    pub touch_queue_bound: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "x-api-key".to_string(),
            query_param: "api_key".to_string(),
            keys: Vec::new(),
            touch_queue_bound: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Layered token-bucket admission control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Global bucket refill rate.
    pub requests_per_second: f64,
    /// Global bucket capacity.
    pub burst: u32,
    /// Optional per-client-IP layer.
    pub per_ip: Option<LimitParams>,
    /// Optional per-API-key layer (innermost; checked first).
    pub per_key: Option<LimitParams>,
    /// Upper bound on live buckets; least-recently-used entries are evicted
    /// beyond this, bounding memory under spoofed-identifier floods.
    pub max_buckets: usize,
    pub sweep_interval_secs: u64,
    /// Buckets untouched for this long are dropped by the sweeper.
    pub bucket_idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 100.0,
            burst: 200,
            per_ip: None,
            per_key: None,
            max_buckets: 10_000,
            sweep_interval_secs: 60,
            bucket_idle_secs: 300,
        }
    }
}

/// Refill rate and burst capacity for one limiter scope.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitParams {
    pub requests_per_second: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Knobs for synthetic response generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Derive string values from property names (first_name, email, ...).
    /// Never overrides an explicit format, pattern or enum.
    pub use_field_heuristics: bool,
    /// Ceiling for the `__delay` simulation parameter.
    pub max_delay_ms: u64,
    /// Fixed generator seed; omit for OS entropy.
    pub seed: Option<u64>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            use_field_heuristics: false,
            max_delay_ms: 10_000,
            seed: None,
        }
    }
}

/// Reverse-proxy fallback for paths the spec does not declare.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub upstream: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            upstream: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
                "PATCH".to_string(),
                "OPTIONS".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    pub enabled: bool,
    /// Also emit Strict-Transport-Security (only meaningful behind TLS).
    pub hsts: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert!(!cfg.auth.enabled);
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.rate_limit.max_buckets, 10_000);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_proxy_requires_upstream() {
        let cfg: ServerConfig = serde_yaml::from_str("proxy:\n  enabled: true\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_api_key_entry_defaults_enabled() {
        let yaml = r#"
auth:
  enabled: true
  keys:
    - key: test123
      name: ci
"#;
        let cfg: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.auth.keys[0].enabled);
        assert!(cfg.auth.keys[0].expires_at.is_none());
    }
}
