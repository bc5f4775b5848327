//! Zero-downtime spec reload.
//!
//! The entire serving state — route table, components map, raw spec text —
//! is one immutable snapshot behind an `ArcSwap`. A reload parses and builds
//! the replacement completely off the request path under a single-writer
//! lock, then publishes it with one atomic pointer swap and clears the
//! response cache in the same operation. In-flight requests keep the `Arc`
//! they loaded, so every request observes either the entirely-old or
//! entirely-new state, never a mix. A failed parse logs and leaves the old
//! snapshot serving.

use crate::cache::{digest16, ResponseCache};
use crate::router::RouteTable;
use crate::spec::load_spec_str;
use arc_swap::ArcSwap;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// One immutable generation of everything the request path reads.
pub struct ServingState {
    pub table: RouteTable,
    pub components: HashMap<String, Value>,
    pub slug: String,
    /// Raw spec text, served at `/openapi.yaml`.
    pub raw_spec: String,
    /// Monotonic generation counter, bumped on every successful reload.
    pub version: u64,
    /// Short content hash of the spec text.
    pub hash: String,
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl ServingState {
    /// Build a state from raw spec content.
    pub fn build(content: &str, yaml: bool, version: u64) -> anyhow::Result<Self> {
        let doc = load_spec_str(content, yaml)?;
        Ok(Self {
            table: RouteTable::from_routes(doc.routes),
            components: doc.components,
            slug: doc.slug,
            raw_spec: content.to_string(),
            version,
            hash: digest16(content),
        })
    }

    /// Build the initial state from a spec file. Failure here is fatal.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::build(&content, is_yaml_path(path), 1)
    }
}

/// Single-writer reload coordinator. Readers go through the `ArcSwap`
/// directly and never take the writer lock.
pub struct Reloader {
    state: Arc<ArcSwap<ServingState>>,
    cache: Arc<ResponseCache>,
    spec_path: PathBuf,
    write_lock: Mutex<()>,
}

impl Reloader {
    pub fn new(
        state: Arc<ArcSwap<ServingState>>,
        cache: Arc<ResponseCache>,
        spec_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            state,
            cache,
            spec_path: spec_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Re-read the spec file, build the replacement state off the request
    /// path, publish it atomically, and clear the response cache so stale
    /// bodies for changed or removed routes are never served. Returns the
    /// new route count.
    pub fn reload(&self) -> anyhow::Result<usize> {
        let _writer = self.write_lock.lock().unwrap();
        let content = std::fs::read_to_string(&self.spec_path)?;
        let version = self.state.load().version + 1;
        let next = ServingState::build(&content, is_yaml_path(&self.spec_path), version)?;
        let route_count = next.table.route_count();
        self.state.store(Arc::new(next));
        self.cache.clear();
        info!(version, route_count, "spec reloaded");
        Ok(route_count)
    }
}

/// Watch the spec file and reload on modification. Reload failures are
/// logged and the previous spec keeps serving; the watcher's lifecycle is
/// independent of any request.
pub fn watch_spec(
    spec_path: impl AsRef<Path>,
    reloader: Arc<Reloader>,
) -> notify::Result<RecommendedWatcher> {
    let path: PathBuf = spec_path.as_ref().to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    if let Err(err) = reloader.reload() {
                        error!(error = %err, "spec reload failed; keeping previous spec");
                    }
                }
            }
            Err(err) => error!(error = %err, "spec watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_V1: &str = r#"
openapi: 3.1.0
info:
  title: Reload Test
  version: "1.0"
paths:
  /foo:
    get:
      operationId: foo
      responses:
        '200': { description: OK }
"#;

    #[test]
    fn test_build_initial_state() {
        let state = ServingState::build(SPEC_V1, true, 1).unwrap();
        assert_eq!(state.version, 1);
        assert_eq!(state.table.route_count(), 1);
        assert!(!state.hash.is_empty());
    }

    #[test]
    fn test_failed_reload_keeps_old_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        std::fs::write(&path, SPEC_V1).unwrap();

        let state = Arc::new(ArcSwap::from_pointee(
            ServingState::from_file(&path).unwrap(),
        ));
        let cache = Arc::new(ResponseCache::new());
        let reloader = Reloader::new(Arc::clone(&state), Arc::clone(&cache), &path);

        std::fs::write(&path, "not: [valid").unwrap();
        assert!(reloader.reload().is_err());
        assert_eq!(state.load().version, 1);
        assert!(state.load().table.has_path("/foo"));
    }

    #[test]
    fn test_reload_swaps_state_and_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        std::fs::write(&path, SPEC_V1).unwrap();

        let state = Arc::new(ArcSwap::from_pointee(
            ServingState::from_file(&path).unwrap(),
        ));
        let cache = Arc::new(ResponseCache::new());
        cache.put("stale".to_string(), 200, b"{}".to_vec());
        let reloader = Reloader::new(Arc::clone(&state), Arc::clone(&cache), &path);

        let v2 = SPEC_V1.replace("/foo", "/bar");
        std::fs::write(&path, v2).unwrap();
        reloader.reload().unwrap();

        let current = state.load();
        assert_eq!(current.version, 2);
        assert!(current.table.has_path("/bar"));
        assert!(!current.table.has_path("/foo"));
        assert!(cache.is_empty());
    }
}
