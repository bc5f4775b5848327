mod build;
mod load;
mod types;

pub use build::{build_routes, extract_components};
pub use load::{load_spec, load_spec_str, SpecDocument};
pub use types::{ResponseSpec, Responses, RouteMeta};
