use http::Method;
use serde_json::Value;
use std::collections::HashMap;

/// One mocked operation: a path template plus HTTP method plus the declared
/// responses it can synthesize. Immutable once built; the whole set is
/// replaced wholesale on spec reload.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    pub path: String,
    /// `operationId` from the spec, or a slug synthesized from method+path.
    pub operation_id: String,
    pub responses: Responses,
}

/// Declared response content for one status + media type.
#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    /// Raw schema with `$ref` nodes intact; resolution happens lazily in the
    /// generator against the components map.
    pub schema: Option<Value>,
    /// The unnamed example, or the first named one when only names exist.
    pub example: Option<Value>,
    /// Named examples, selectable per request.
    pub named_examples: HashMap<String, Value>,
}

pub type Responses = HashMap<u16, HashMap<String, ResponseSpec>>;

impl RouteMeta {
    /// Content type served for a status: `application/json` when declared,
    /// otherwise the first declared media type.
    pub fn content_type_for(&self, status: u16) -> Option<String> {
        let media = self.responses.get(&status)?;
        if media.contains_key("application/json") {
            return Some("application/json".to_string());
        }
        media.keys().next().cloned()
    }

    /// The response spec for a status, preferring `application/json`.
    pub fn response_for(&self, status: u16) -> Option<&ResponseSpec> {
        let media = self.responses.get(&status)?;
        media
            .get("application/json")
            .or_else(|| media.values().next())
    }

    pub fn declared_statuses(&self) -> Vec<u16> {
        let mut statuses: Vec<u16> = self.responses.keys().copied().collect();
        statuses.sort_unstable();
        statuses
    }

    /// Status served when the caller does not override it: 200 when
    /// declared, else the lowest declared 2xx, else the lowest declared
    /// status, else 200.
    pub fn default_status(&self) -> u16 {
        if self.responses.contains_key(&200) {
            return 200;
        }
        let statuses = self.declared_statuses();
        statuses
            .iter()
            .find(|s| (200..300).contains(*s))
            .or_else(|| statuses.first())
            .copied()
            .unwrap_or(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_with_statuses(statuses: &[u16]) -> RouteMeta {
        let mut responses: Responses = HashMap::new();
        for status in statuses {
            responses
                .entry(*status)
                .or_default()
                .insert("application/json".to_string(), ResponseSpec::default());
        }
        RouteMeta {
            method: Method::GET,
            path: "/things".to_string(),
            operation_id: "list_things".to_string(),
            responses,
        }
    }

    #[test]
    fn test_default_status_prefers_200() {
        assert_eq!(route_with_statuses(&[404, 200, 201]).default_status(), 200);
    }

    #[test]
    fn test_default_status_falls_back_to_lowest_2xx() {
        assert_eq!(route_with_statuses(&[404, 204, 201]).default_status(), 201);
    }

    #[test]
    fn test_default_status_falls_back_to_lowest_declared() {
        assert_eq!(route_with_statuses(&[500, 404]).default_status(), 404);
        assert_eq!(route_with_statuses(&[]).default_status(), 200);
    }
}
