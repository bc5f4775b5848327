//! # mimicd
//!
//! **mimicd** is an OpenAPI-spec-driven mock HTTP server built on the `may`
//! coroutine runtime. Point it at a specification and every declared
//! path/method pair is served with a synthetic response matching its schema,
//! under production-like constraints: layered rate limiting, API-key
//! authentication, response caching and zero-downtime spec reload.
//!
//! ## Architecture
//!
//! The serving core is four tightly coupled pieces:
//!
//! - **[`generator`]** — schema-driven value synthesis: explicit examples,
//!   enums, `allOf`/`oneOf`/`anyOf` composition, format- and pattern-aware
//!   strings, cycle-safe recursion through `$ref` graphs.
//! - **[`admission`]** + **[`auth`]** — an onion of token buckets
//!   (per-API-key → per-IP → global) in a bounded LRU store, and a
//!   constant-time API-key registry with fire-and-forget last-used tracking.
//! - **[`cache`]** — fingerprinted response cache: stable keys despite query
//!   parameter ordering and content-negotiation headers.
//! - **[`router`]** + **[`hot_reload`]** — an immutable route table inside
//!   an atomically swappable serving snapshot, so in-flight requests never
//!   observe a torn state across reloads.
//!
//! Around them the usual machinery: **[`spec`]** (OpenAPI parsing via
//! `oas3`), **[`server`]** (the `may_minihttp` service and pipeline),
//! **[`middleware`]** (metrics, CORS, security headers, tracing),
//! **[`proxy`]** (reverse-proxy fallback for undeclared paths),
//! **[`config`]**, **[`errors`]**, and a small **[`cli`]**.
//!
//! ## Request flow
//!
//! Resolve path/method → admission control → auth → control parameters
//! (`__status`, `__example`, `__delay`) → cache lookup by fingerprint → on
//! miss, declared example or generated value → cache write → response.
//! `/health`, `/ready`, `/metrics`, `/docs` and `/openapi.yaml` are served
//! directly and bypass admission and auth.
//!
//! ## Quick start
//!
//! ```no_run
//! use arc_swap::ArcSwap;
//! use mimicd::config::ServerConfig;
//! use mimicd::hot_reload::ServingState;
//! use mimicd::server::{AppService, HttpServer};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let state = Arc::new(ArcSwap::from_pointee(ServingState::from_file("openapi.yaml")?));
//! let service = AppService::new(state, ServerConfig::default())?;
//! let handle = HttpServer(service).start("127.0.0.1:8080")?;
//! handle.join().ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Notes
//!
//! - The response cache has no TTL and no per-entry eviction; it is cleared
//!   wholesale on spec reload. High-cardinality query parameters grow it
//!   without bound — a deliberate simplicity trade-off.
//! - Generation randomness flows through one seam: OS entropy in
//!   production, a fixed seed via `response.seed` for reproducible runs.
//! - Coroutine stack size is tunable via `MIMICD_STACK_SIZE`.

pub mod admission;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod generator;
pub mod hot_reload;
mod ids;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod spec;

pub use errors::RequestError;
pub use generator::{GenerationContext, ValueGenerator};
pub use ids::RequestId;
pub use spec::{load_spec, load_spec_str, RouteMeta, SpecDocument};
