//! Document filters with JSON containment semantics.

use serde_json::{Map, Value};

/// A document filter: a JSON object the document must contain.
///
/// Containment follows `PostgreSQL`'s `jsonb @>` operator, so the same filter
/// means the same thing for every record source:
/// - objects contain every key of the filter, recursively
/// - arrays contain every element of the filter array somewhere
/// - scalars are equal
///
/// The empty filter matches every document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// The filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Require a (possibly dotted) field to equal a value.
    #[must_use]
    pub fn eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        let nested = path
            .rsplit('.')
            .fold(value.into(), |inner, segment| {
                let mut object = Map::new();
                object.insert(segment.to_string(), inner);
                Value::Object(object)
            });
        if let Value::Object(object) = nested {
            merge(&mut self.0, object);
        }
        self
    }

    /// Whether this filter matches every document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a document satisfies this filter.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        doc.as_object()
            .is_some_and(|object| self.0.iter().all(|(k, v)| object.get(k).is_some_and(|d| contains(d, v))))
    }

    /// The filter as a JSON object, for binding to a containment query.
    #[must_use]
    pub fn as_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

fn merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn contains(doc: &Value, filter: &Value) -> bool {
    match (doc, filter) {
        (Value::Object(d), Value::Object(f)) => f
            .iter()
            .all(|(k, fv)| d.get(k).is_some_and(|dv| contains(dv, fv))),
        (Value::Array(d), Value::Array(f)) => {
            f.iter().all(|fv| d.iter().any(|dv| contains(dv, fv)))
        }
        (d, f) => d == f,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_filter_matches_objects() {
        assert!(Filter::all().matches(&json!({"a": 1})));
        assert!(Filter::all().is_empty());
    }

    #[test]
    fn test_nested_equality() {
        let filter = Filter::all().eq("default_address.city", "Austin");
        assert_eq!(filter.as_json(), json!({"default_address": {"city": "Austin"}}));
        assert!(filter.matches(&json!({"default_address": {"city": "Austin", "country": "US"}})));
        assert!(!filter.matches(&json!({"default_address": {"city": "Dallas"}})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn test_merging_sibling_paths() {
        let filter = Filter::all()
            .eq("default_address.city", "Austin")
            .eq("default_address.country", "US");
        assert_eq!(
            filter.as_json(),
            json!({"default_address": {"city": "Austin", "country": "US"}})
        );
    }

    #[test]
    fn test_array_containment() {
        let filter = Filter::all().eq("tags", json!(["vip"]));
        assert!(filter.matches(&json!({"tags": ["new", "vip"]})));
        assert!(!filter.matches(&json!({"tags": ["new"]})));
    }
}
