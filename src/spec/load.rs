use super::build::{build_routes, extract_components};
use super::types::RouteMeta;
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Everything the serving core needs from one parsed OpenAPI document.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    pub routes: Vec<RouteMeta>,
    /// components.schemas, raw, for lazy `$ref` resolution during generation.
    pub components: HashMap<String, Value>,
    /// URL-safe slug derived from `info.title`.
    pub slug: String,
}

/// Drop path-item keys that are neither HTTP verbs nor known metadata so
/// vendor noise cannot fail deserialization.
fn strip_unknown_verbs(val: &mut Value) {
    const METHODS: [&str; 8] = [
        "get", "post", "put", "delete", "patch", "options", "head", "trace",
    ];

    if let Some(Value::Object(paths_map)) = val.get_mut("paths") {
        for item in paths_map.values_mut() {
            if let Value::Object(obj) = item {
                let keys: Vec<String> = obj.keys().cloned().collect();
                for k in keys {
                    let lk = k.to_ascii_lowercase();
                    let keep = match lk.as_str() {
                        "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                        m if METHODS.contains(&m) => true,
                        _ => k.starts_with("x-"),
                    };
                    if !keep {
                        obj.remove(&k);
                    }
                }
            }
        }
    }
}

fn slug_from_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_ascii_alphanumeric(), "_")
        .trim_matches('_')
        .to_string()
}

/// Parse a spec from raw content. `yaml` selects the front-end syntax; the
/// document is normalized through `serde_json::Value` either way.
pub fn load_spec_str(content: &str, yaml: bool) -> anyhow::Result<SpecDocument> {
    let mut value: Value = if yaml {
        serde_yaml::from_str(content)?
    } else {
        serde_json::from_str(content)?
    };
    strip_unknown_verbs(&mut value);
    let spec: OpenApiV3Spec = serde_json::from_value(value)?;

    let slug = slug_from_title(&spec.info.title);
    let routes = build_routes(&spec)?;
    let components = extract_components(&spec);
    Ok(SpecDocument {
        routes,
        components,
        slug,
    })
}

/// Load a spec file; `.yaml`/`.yml` parse as YAML, anything else as JSON.
pub fn load_spec(path: impl AsRef<Path>) -> anyhow::Result<SpecDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    load_spec_str(&content, yaml)
}
