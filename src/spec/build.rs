use super::types::{ResponseSpec, Responses, RouteMeta};
use oas3::spec::{MediaTypeExamples, ObjectOrReference};
use oas3::OpenApiV3Spec;
use serde_json::Value;
use std::collections::HashMap;

/// Extract the named components.schemas as raw JSON schemas. `$ref` nodes
/// inside them stay unresolved; the generator resolves against this map
/// lazily so recursive schema graphs never blow up an eager expansion.
pub fn extract_components(spec: &OpenApiV3Spec) -> HashMap<String, Value> {
    spec.components
        .as_ref()
        .map(|components| {
            components
                .schemas
                .iter()
                .filter_map(|(name, schema_ref)| match schema_ref {
                    ObjectOrReference::Object(schema) => serde_json::to_value(schema)
                        .ok()
                        .map(|value| (name.clone(), value)),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn media_schema_value(media: &oas3::spec::MediaType) -> Option<Value> {
    match media.schema.as_ref()? {
        ObjectOrReference::Object(schema) => serde_json::to_value(schema).ok(),
        ObjectOrReference::Ref { ref_path, .. } => {
            Some(serde_json::json!({ "$ref": ref_path }))
        }
    }
}

fn media_examples(media: &oas3::spec::MediaType) -> (Option<Value>, HashMap<String, Value>) {
    match &media.examples {
        Some(MediaTypeExamples::Example { example }) => (Some(example.clone()), HashMap::new()),
        Some(MediaTypeExamples::Examples { examples }) => {
            let named: HashMap<String, Value> = examples
                .iter()
                .filter_map(|(name, example_ref)| match example_ref {
                    ObjectOrReference::Object(example) => example
                        .value
                        .clone()
                        .map(|value| (name.clone(), value)),
                    _ => None,
                })
                .collect();
            let first = examples.iter().find_map(|(name, _)| named.get(name).cloned());
            (first, named)
        }
        None => (None, HashMap::new()),
    }
}

/// Collect every declared response of an operation, keyed by status code and
/// media type. Non-numeric statuses (`default`, `2XX` ranges) are skipped —
/// the mock serves concrete codes only.
fn extract_responses(operation: &oas3::spec::Operation) -> Responses {
    let mut all: Responses = HashMap::new();
    if let Some(responses_map) = operation.responses.as_ref() {
        for (status_str, resp_ref) in responses_map {
            let status: u16 = match status_str.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if let ObjectOrReference::Object(resp_obj) = resp_ref {
                for (media_type, media) in &resp_obj.content {
                    let (example, named_examples) = media_examples(media);
                    all.entry(status).or_default().insert(
                        media_type.clone(),
                        ResponseSpec {
                            schema: media_schema_value(media),
                            example,
                            named_examples,
                        },
                    );
                }
                // A declared status with no content still resolves (empty body).
                all.entry(status).or_default();
            }
        }
    }
    all
}

fn synthesize_operation_id(method: &http::Method, path: &str) -> String {
    let slug = path
        .to_lowercase()
        .replace(|c: char| !c.is_ascii_alphanumeric(), "_");
    format!("{}_{}", method.as_str().to_lowercase(), slug.trim_matches('_'))
}

/// Build route metadata for all operations in a parsed OpenAPI spec.
pub fn build_routes(spec: &OpenApiV3Spec) -> anyhow::Result<Vec<RouteMeta>> {
    let mut routes = Vec::new();
    if let Some(paths_map) = spec.paths.as_ref() {
        for (path, item) in paths_map {
            for (method, operation) in item.methods() {
                let operation_id = operation
                    .operation_id
                    .clone()
                    .unwrap_or_else(|| synthesize_operation_id(&method, path));
                routes.push(RouteMeta {
                    method: method.clone(),
                    path: path.clone(),
                    operation_id,
                    responses: extract_responses(operation),
                });
            }
        }
    }
    Ok(routes)
}
