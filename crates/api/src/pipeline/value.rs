//! JSON value helpers: dotted-path access, ordering and summation.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Look up a dotted field path (e.g., `default_address.city`).
///
/// Returns `None` when any segment is missing or a parent is not an object.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Overwrite the value at a dotted field path.
///
/// Parents must already exist as objects; the final segment is inserted if
/// absent. Returns `false` when the path cannot be reached.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        let Some(object) = current.as_object_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            object.insert(segment.to_string(), value);
            return true;
        }
        match object.get_mut(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    false
}

/// Sort rank of a value's type: null, numbers, strings, objects, arrays, booleans.
const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Whether two values belong to the same comparison bracket.
pub const fn same_type(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Total order over JSON values used by sort and range predicates.
///
/// Values of different types order by type rank. Numbers compare
/// numerically, strings lexicographically, booleans `false < true`;
/// objects and arrays compare equal within their type.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Running `$sum`-style total.
///
/// Integer inputs keep the total integral until a float arrives or the
/// integer total would overflow; non-numeric inputs are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sum {
    Int(i64),
    Float(f64),
}

impl Default for Sum {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl Sum {
    /// Add a value to the total. Non-numeric values are ignored.
    pub fn add(&mut self, value: &Value) {
        let Value::Number(n) = value else {
            return;
        };
        *self = match (*self, n.as_i64()) {
            (Self::Int(total), Some(i)) => total
                .checked_add(i)
                .map_or_else(|| Self::Float(as_float(total) + as_float(i)), Self::Int),
            (Self::Int(total), None) => Self::Float(as_float(total) + n.as_f64().unwrap_or(0.0)),
            (Self::Float(total), _) => Self::Float(total + n.as_f64().unwrap_or(0.0)),
        };
    }

    /// The total as a JSON value. Non-finite float totals become null.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Int(total) => Value::from(total),
            Self::Float(total) => Number::from_f64(total).map_or(Value::Null, Value::Number),
        }
    }
}

#[allow(clippy::cast_precision_loss)] // Totals beyond 2^53 lose precision, as in any float sum
const fn as_float(n: i64) -> f64 {
    n as f64
}
