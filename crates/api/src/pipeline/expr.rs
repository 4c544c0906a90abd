//! Expressions evaluated against a single document.

use rq_analytics_core::{CoercionError, CoercionPolicy, Interval, coerce_amount, parse_timestamp};
use serde_json::{Map, Value};

use super::value::get_path;

/// An expression computing a value from a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The value at a dotted field path; missing fields evaluate to null.
    Field(String),
    /// A constant.
    Literal(Value),
    /// The interval bucket key of a timestamp field.
    ///
    /// Evaluates to no value when the field is missing, null or not a
    /// timestamp, so the document drops out of any grouping keyed on it.
    /// Each such document is counted once, here.
    Bucket(Interval, String),
    /// A stored amount (decimal string or number) coerced to a float.
    ToDouble(String),
    /// A compound key built from named sub-expressions.
    Object(Vec<(String, Expr)>),
}

impl Expr {
    /// Shorthand for [`Expr::Field`].
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    /// Shorthand for [`Expr::Bucket`].
    #[must_use]
    pub fn bucket(interval: Interval, path: impl Into<String>) -> Self {
        Self::Bucket(interval, path.into())
    }

    /// Shorthand for [`Expr::ToDouble`].
    #[must_use]
    pub fn to_double(path: impl Into<String>) -> Self {
        Self::ToDouble(path.into())
    }

    /// Evaluate against a document.
    ///
    /// `Ok(None)` means the expression has no value for this document.
    /// Under the lenient policy, unparsable timestamps yield `Ok(None)` and
    /// unparsable amounts yield `0`; under the strict policy both are errors.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] under [`CoercionPolicy::Strict`].
    pub fn eval(
        &self,
        doc: &Value,
        policy: CoercionPolicy,
        stats: &mut CoercionStats,
    ) -> Result<Option<Value>, CoercionError> {
        match self {
            Self::Field(path) => Ok(Some(get_path(doc, path).cloned().unwrap_or(Value::Null))),
            Self::Literal(value) => Ok(Some(value.clone())),
            Self::Bucket(interval, path) => {
                let raw = get_path(doc, path).unwrap_or(&Value::Null);
                match parse_timestamp(raw) {
                    Ok(ts) => Ok(Some(Value::from(interval.bucket(&ts)))),
                    Err(err) if policy.is_strict() => Err(err),
                    Err(_) => {
                        stats.invalid_timestamps += 1;
                        Ok(None)
                    }
                }
            }
            Self::ToDouble(path) => {
                let raw = get_path(doc, path).unwrap_or(&Value::Null);
                match coerce_amount(raw) {
                    Ok(amount) => Ok(Some(Value::from(amount))),
                    Err(err) if policy.is_strict() => Err(err),
                    Err(_) => {
                        stats.invalid_amounts += 1;
                        Ok(Some(Value::from(0.0)))
                    }
                }
            }
            Self::Object(fields) => {
                let mut object = Map::with_capacity(fields.len());
                for (name, expr) in fields {
                    let Some(value) = expr.eval(doc, policy, stats)? else {
                        return Ok(None);
                    };
                    object.insert(name.clone(), value);
                }
                Ok(Some(Value::Object(object)))
            }
        }
    }
}

/// Counts of records whose values were swallowed under the lenient policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionStats {
    /// Records excluded because a timestamp did not parse.
    pub invalid_timestamps: u64,
    /// Amounts that did not parse and were counted as zero.
    pub invalid_amounts: u64,
}

impl CoercionStats {
    /// Whether any value was swallowed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.invalid_timestamps == 0 && self.invalid_amounts == 0
    }
}
