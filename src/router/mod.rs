//! Route table and request resolution.
//!
//! The table is built once per parsed spec and never mutated: path →
//! declared routes (one per method) plus a derived allowed-methods list per
//! path for `405` responses. Resolution is an exact path match; templated
//! paths are served verbatim as declared. Replacement happens wholesale
//! through the serving-state snapshot, so readers never observe a torn
//! table.

use crate::spec::RouteMeta;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of resolving a method + path pair.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Matched a declared operation.
    Route(Arc<RouteMeta>),
    /// Path exists, method does not; carries the exact declared method set.
    MethodNotAllowed(Vec<Method>),
    /// Path undeclared; candidate for proxy fallback.
    NotFound,
}

/// Immutable routing table for one spec generation.
pub struct RouteTable {
    paths: HashMap<String, Vec<Arc<RouteMeta>>>,
    allowed: HashMap<String, Vec<Method>>,
}

impl RouteTable {
    pub fn from_routes(routes: Vec<RouteMeta>) -> Self {
        let supported = [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
            Method::HEAD,
            Method::TRACE,
        ];

        let mut paths: HashMap<String, Vec<Arc<RouteMeta>>> = HashMap::new();
        for route in routes {
            if !supported.contains(&route.method) {
                continue;
            }
            paths
                .entry(route.path.clone())
                .or_default()
                .push(Arc::new(route));
        }

        let allowed: HashMap<String, Vec<Method>> = paths
            .iter()
            .map(|(path, routes)| {
                let mut methods: Vec<Method> =
                    routes.iter().map(|r| r.method.clone()).collect();
                methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                methods.dedup();
                (path.clone(), methods)
            })
            .collect();

        let summary: Vec<String> = paths
            .iter()
            .take(10)
            .flat_map(|(path, routes)| {
                routes
                    .iter()
                    .map(move |r| format!("{} {}", r.method, path))
            })
            .collect();
        info!(
            route_count = paths.values().map(Vec::len).sum::<usize>(),
            paths = paths.len(),
            summary = ?summary,
            "routing table built"
        );

        Self { paths, allowed }
    }

    /// Exact-match dispatch.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        match self.paths.get(path) {
            Some(routes) => {
                if let Some(route) = routes.iter().find(|r| &r.method == method) {
                    debug!(method = %method, path = %path, operation = %route.operation_id, "route matched");
                    Resolution::Route(Arc::clone(route))
                } else {
                    debug!(method = %method, path = %path, "method not allowed");
                    Resolution::MethodNotAllowed(
                        self.allowed.get(path).cloned().unwrap_or_default(),
                    )
                }
            }
            None => {
                debug!(method = %method, path = %path, "no route matched");
                Resolution::NotFound
            }
        }
    }

    pub fn route_count(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Iterate declared routes (introspection and the `check` command).
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteMeta>> {
        self.paths.values().flatten()
    }
}
