//! Coercion of stored document values into timestamps and amounts.
//!
//! Documents come from an upstream commerce system and are not validated on
//! write. Timestamps may carry any UTC offset or none at all, and order
//! amounts are stored as decimal strings. These functions define exactly
//! which inputs are accepted; everything else is a [`CoercionError`], and the
//! caller's [`CoercionPolicy`] decides whether that error is fatal.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Naive datetime layouts accepted in addition to RFC 3339. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Errors raised when a stored value cannot be coerced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    /// A `created_at` value could not be parsed as a timestamp.
    #[error("cannot parse timestamp from {0}")]
    Timestamp(String),
    /// An amount could not be parsed as a decimal number.
    #[error("cannot parse amount from {0}")]
    Amount(String),
    /// An amount parsed but is negative or not finite.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),
}

/// How per-record coercion failures are handled.
///
/// - `Lenient` swallows the failure: an unparsable timestamp excludes the
///   record from bucketed metrics and an unparsable amount counts as zero.
/// - `Strict` fails the whole request with the coercion error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionPolicy {
    #[default]
    Lenient,
    Strict,
}

impl CoercionPolicy {
    /// Whether coercion failures abort the request.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }
}

impl FromStr for CoercionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown coercion policy {other:?} (expected lenient or strict)")),
        }
    }
}

impl fmt::Display for CoercionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => f.write_str("lenient"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// Parse a stored timestamp value into a UTC instant.
///
/// Accepts:
/// - RFC 3339 strings with any offset (`2024-03-15T10:22:11-04:00`)
/// - naive `YYYY-MM-DDTHH:MM:SS[.fff]` and `YYYY-MM-DD HH:MM:SS[.fff]`, as UTC
/// - bare `YYYY-MM-DD` dates, as midnight UTC
/// - integer epoch milliseconds
///
/// # Errors
///
/// Returns [`CoercionError::Timestamp`] for any other value, including null.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, CoercionError> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim())
            .ok_or_else(|| CoercionError::Timestamp(value.to_string())),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| CoercionError::Timestamp(value.to_string())),
        _ => Err(CoercionError::Timestamp(value.to_string())),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Coerce a stored amount into a non-negative finite number.
///
/// Accepts JSON numbers and decimal strings such as `"19.99"` (surrounding
/// whitespace is ignored).
///
/// # Errors
///
/// Returns [`CoercionError::Amount`] for values that are not numbers or
/// decimal strings, and [`CoercionError::AmountOutOfRange`] for negative or
/// non-finite values.
pub fn coerce_amount(value: &Value) -> Result<f64, CoercionError> {
    let amount = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoercionError::Amount(value.to_string()))?,
        Value::String(s) => Decimal::from_str(s.trim())
            .ok()
            .and_then(|d| d.to_f64())
            .ok_or_else(|| CoercionError::Amount(value.to_string()))?,
        _ => return Err(CoercionError::Amount(value.to_string())),
    };

    if !amount.is_finite() || amount < 0.0 {
        return Err(CoercionError::AmountOutOfRange(value.to_string()));
    }
    Ok(amount)
}
