mod core;
mod cors;
mod metrics;
mod security_headers;
mod tracing;

pub use self::core::{Middleware, ResponseParts};
pub use self::cors::CorsMiddleware;
pub use self::metrics::MetricsMiddleware;
pub use self::security_headers::SecurityHeadersMiddleware;
pub use self::tracing::TracingMiddleware;
