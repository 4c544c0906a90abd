//! Bucket keys identifying the group a metric row belongs to.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `_id` of an analytics row.
///
/// Serialized untagged so rows read as plain JSON: `7`, `"Other"`,
/// `"Austin"` or `null`. Grouped values of any other shape (objects, arrays,
/// booleans) are kept as they were stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketKey {
    /// An integer key (day, month, quarter, year, or a range lower bound).
    Int(i64),
    /// A non-integral numeric key.
    Float(f64),
    /// A textual key (a city, or the `"Other"` fallback range).
    Label(String),
    /// No value: the grouped field was missing or null.
    Missing,
    /// Any other grouped value, such as an object-valued city.
    Composite(Value),
}

impl BucketKey {
    /// The catch-all label used for values outside every numeric range.
    pub const OTHER: &'static str = "Other";

    /// Build the catch-all `"Other"` key.
    #[must_use]
    pub fn other() -> Self {
        Self::Label(Self::OTHER.to_string())
    }
}

impl From<i64> for BucketKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for BucketKey {
    fn from(s: &str) -> Self {
        Self::Label(s.to_string())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Label(s) => f.write_str(s),
            Self::Missing => f.write_str("null"),
            Self::Composite(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serializes_as_plain_json() {
        assert_eq!(serde_json::to_value(BucketKey::Int(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(BucketKey::other()).unwrap(), json!("Other"));
        assert_eq!(serde_json::to_value(BucketKey::Missing).unwrap(), json!(null));
    }

    #[test]
    fn test_deserializes_each_shape() {
        assert_eq!(
            serde_json::from_value::<BucketKey>(json!(2023)).unwrap(),
            BucketKey::Int(2023)
        );
        assert_eq!(
            serde_json::from_value::<BucketKey>(json!(2.5)).unwrap(),
            BucketKey::Float(2.5)
        );
        assert_eq!(
            serde_json::from_value::<BucketKey>(json!("Austin")).unwrap(),
            BucketKey::Label("Austin".to_string())
        );
        assert_eq!(
            serde_json::from_value::<BucketKey>(json!(null)).unwrap(),
            BucketKey::Missing
        );
    }

    #[test]
    fn test_other_shapes_are_kept_verbatim() {
        for value in [json!({"name": "Austin"}), json!(true), json!(["a", "b"])] {
            let key = serde_json::from_value::<BucketKey>(value.clone()).unwrap();
            assert_eq!(key, BucketKey::Composite(value.clone()));
            assert_eq!(serde_json::to_value(&key).unwrap(), value);
        }
        assert_eq!(
            BucketKey::Composite(json!({"name": "Austin"})).to_string(),
            r#"{"name":"Austin"}"#
        );
    }
}
