//! Result rows returned by the analytics pipelines.
//!
//! Field names match the JSON the dashboards consume (`_id`, `totalSales`,
//! ...), so rows serialize straight into response bodies.

use rq_analytics_core::BucketKey;
use serde::{Deserialize, Serialize};

/// Sales summed over one interval bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRow {
    #[serde(rename = "_id")]
    pub bucket: i64,
    #[serde(rename = "totalSales")]
    pub total_sales: f64,
}

/// Sales summed over one growth range (a lower boundary or `"Other"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesGrowthRow {
    #[serde(rename = "_id")]
    pub range: BucketKey,
    #[serde(rename = "totalSales")]
    pub total_sales: f64,
}

/// Customers created in one interval bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomersRow {
    #[serde(rename = "_id")]
    pub bucket: i64,
    pub count: i64,
}

/// Customers who ordered more than once within one interval bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatCustomersRow {
    #[serde(rename = "_id")]
    pub bucket: i64,
    #[serde(rename = "repeatCustomersCount")]
    pub repeat_customers_count: i64,
}

/// Customers whose default address is in one city.
///
/// `city` is [`BucketKey::Missing`] for customers without an address or city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRow {
    #[serde(rename = "_id")]
    pub city: BucketKey,
    pub count: i64,
}

/// Lifetime value of the customers who signed up in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeValueRow {
    #[serde(rename = "_id")]
    pub month: i64,
    #[serde(rename = "lifetimeValue")]
    pub lifetime_value: f64,
}
