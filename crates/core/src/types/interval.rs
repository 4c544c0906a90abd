//! Interval granularity used to bucket record timestamps.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur when resolving an [`Interval`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// The interval name is not one of the supported granularities.
    #[error("Invalid interval: {0:?} (expected one of daily, monthly, quarterly, yearly)")]
    Invalid(String),
    /// The interval parameter was not supplied.
    #[error("Invalid interval: missing interval parameter")]
    Missing,
}

/// Timestamp bucketing granularity.
///
/// Each interval maps a UTC timestamp to a small integer bucket key:
///
/// | Interval    | Bucket key              |
/// |-------------|-------------------------|
/// | `daily`     | day of month (1-31)     |
/// | `monthly`   | calendar month (1-12)   |
/// | `quarterly` | ceil(month / 3) (1-4)   |
/// | `yearly`    | calendar year           |
///
/// Keys deliberately drop the enclosing period: `daily` buckets the 15th of
/// every month together, `monthly` buckets every July together.
///
/// ## Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use rq_analytics_core::Interval;
///
/// let ts = Utc.with_ymd_and_hms(2023, 7, 15, 12, 0, 0).unwrap();
/// let quarterly: Interval = "quarterly".parse().unwrap();
/// assert_eq!(quarterly.bucket(&ts), 3);
///
/// assert!("weekly".parse::<Interval>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Monthly,
    Quarterly,
    Yearly,
}

impl Interval {
    /// All supported intervals.
    pub const ALL: [Self; 4] = [Self::Daily, Self::Monthly, Self::Quarterly, Self::Yearly];

    /// Resolve an optional interval name, as received from a query string.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalError::Missing`] for `None` and
    /// [`IntervalError::Invalid`] for an unknown name.
    pub fn resolve(name: Option<&str>) -> Result<Self, IntervalError> {
        name.ok_or(IntervalError::Missing)?.parse()
    }

    /// The canonical lowercase name of this interval.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Compute the bucket key for a timestamp.
    #[must_use]
    pub fn bucket(&self, timestamp: &DateTime<Utc>) -> i64 {
        match self {
            Self::Daily => i64::from(timestamp.day()),
            Self::Monthly => i64::from(timestamp.month()),
            Self::Quarterly => i64::from(timestamp.month().div_ceil(3)),
            Self::Yearly => i64::from(timestamp.year()),
        }
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            other => Err(IntervalError::Invalid(other.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
