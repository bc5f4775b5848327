//! API-key authentication.
//!
//! The registry is an in-memory list behind a read-write lock: validation
//! (frequent) takes the read lock, key generation and revocation (rare) take
//! the write lock. Key comparison is constant-time byte comparison; lookup
//! is a linear scan, which is fine for the handful of keys a mock deployment
//! carries and is a scaling limit, not a correctness issue.
//!
//! Accepted validations record `last_used_at` through a bounded queue
//! drained by a single background coroutine, so the write lock is never
//! taken on the request path and updates cannot be lost to racing readers.
//! When the queue is full the update is shed — the timestamp is best-effort
//! by design.

use crate::config::{ApiKeyEntry, AuthConfig};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error};

/// Why a credential was rejected. The variant name doubles as the
/// machine-readable `code` in the 401 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
    #[error("API key expired")]
    Expired,
    #[error("API key disabled")]
    Disabled,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "auth_missing",
            AuthError::Invalid => "auth_invalid",
            AuthError::Expired => "auth_expired",
            AuthError::Disabled => "auth_disabled",
        }
    }
}

/// A registered API key. Keys are never deleted at runtime, only disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl ApiKey {
    fn from_entry(entry: &ApiKeyEntry) -> Self {
        Self {
            key: entry.key.clone(),
            name: entry.name.clone(),
            enabled: entry.enabled,
            created_at: Utc::now(),
            expires_at: entry.expires_at,
            last_used_at: None,
            metadata: entry.metadata.clone(),
        }
    }

    /// A key is accepted only while enabled and unexpired.
    fn check_live(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
        if !self.enabled {
            return Err(AuthError::Disabled);
        }
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return Err(AuthError::Expired);
            }
        }
        Ok(())
    }
}

struct TouchQueue {
    tx: may::sync::mpsc::Sender<String>,
    depth: Arc<AtomicUsize>,
    bound: usize,
}

impl TouchQueue {
    /// Enqueue a last-used update; shed when the queue is full.
    fn push(&self, key_name: String) {
        if self.depth.load(Ordering::Relaxed) >= self.bound {
            debug!(key = %key_name, "touch queue full, shedding last-used update");
            return;
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(key_name).is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// The authentication gate composed at the request boundary.
pub struct AuthGate {
    enabled: bool,
    header_name: String,
    query_param: String,
    registry: Arc<RwLock<Vec<ApiKey>>>,
    touch: TouchQueue,
}

impl AuthGate {
    pub fn new(cfg: &AuthConfig) -> Self {
        let registry: Arc<RwLock<Vec<ApiKey>>> = Arc::new(RwLock::new(
            cfg.keys.iter().map(ApiKey::from_entry).collect(),
        ));
        let touch = spawn_touch_drainer(Arc::clone(&registry), cfg.touch_queue_bound);
        Self {
            enabled: cfg.enabled,
            header_name: cfg.header_name.to_ascii_lowercase(),
            query_param: cfg.query_param.clone(),
            registry,
            touch,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pull the credential from the request, in precedence order: configured
    /// header, configured query parameter, `Authorization: Bearer`. First
    /// non-empty value wins. Header keys are lowercased by the parser.
    pub fn extract_key(
        &self,
        headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
    ) -> Option<String> {
        if let Some(value) = headers.get(&self.header_name) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
        if let Some(value) = query.get(&self.query_param) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
        headers
            .get("authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .map(|token| token.to_string())
    }

    /// Validate a provided credential against the registry.
    ///
    /// With auth disabled every request is accepted (`Ok(None)`). On success
    /// a last-used update is queued without blocking the request path.
    pub fn validate(&self, provided: Option<&str>) -> Result<Option<ApiKey>, AuthError> {
        if !self.enabled {
            return Ok(None);
        }
        let provided = provided.ok_or(AuthError::Missing)?;

        let registry = self.registry.read().unwrap();
        let matched = registry
            .iter()
            .find(|entry| bool::from(entry.key.as_bytes().ct_eq(provided.as_bytes())));
        let key = matched.ok_or(AuthError::Invalid)?;
        key.check_live(Utc::now())?;

        let accepted = key.clone();
        drop(registry);
        self.touch.push(accepted.name.clone());
        Ok(Some(accepted))
    }

    /// Mint a new enabled key and register it. The raw key material is
    /// returned exactly once; callers are expected to persist it in config.
    pub fn generate_key(&self, name: &str) -> ApiKey {
        let mut raw = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let key = ApiKey {
            key: URL_SAFE_NO_PAD.encode(raw),
            name: name.to_string(),
            enabled: true,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            metadata: HashMap::new(),
        };
        self.registry.write().unwrap().push(key.clone());
        key
    }

    /// Disable a key by name. Returns false when no key carries the name.
    pub fn disable_key(&self, name: &str) -> bool {
        let mut registry = self.registry.write().unwrap();
        match registry.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                entry.enabled = false;
                true
            }
            None => false,
        }
    }

    pub fn key_count(&self) -> usize {
        self.registry.read().unwrap().len()
    }

    /// Read back a key record by name (tests and introspection).
    pub fn find_key(&self, name: &str) -> Option<ApiKey> {
        self.registry
            .read()
            .unwrap()
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
    }
}

/// Start the single consumer that applies queued last-used updates under the
/// write lock. Its lifecycle is independent of any request.
fn spawn_touch_drainer(registry: Arc<RwLock<Vec<ApiKey>>>, bound: usize) -> TouchQueue {
    let (tx, rx) = may::sync::mpsc::channel::<String>();
    let depth = Arc::new(AtomicUsize::new(0));
    let drain_depth = Arc::clone(&depth);
    // SAFETY: may's spawn is unsafe by runtime contract; the closure owns its
    // captures and exits when the sender side is dropped.
    let _ = unsafe {
        may::coroutine::spawn(move || {
            for key_name in rx.iter() {
                drain_depth.fetch_sub(1, Ordering::Relaxed);
                match registry.write() {
                    Ok(mut keys) => {
                        if let Some(entry) = keys.iter_mut().find(|entry| entry.name == key_name) {
                            entry.last_used_at = Some(Utc::now());
                        }
                    }
                    Err(poisoned) => {
                        error!(key = %key_name, error = %poisoned, "touch drainer lost write lock");
                    }
                }
            }
        })
    };
    TouchQueue { tx, depth, bound }
}
