//! The six analytics pipelines.
//!
//! [`Analytics`] binds a [`RecordSource`] and a [`CoercionPolicy`], resolves
//! the caller's interval, runs the matching stage list from [`pipelines`]
//! and decodes the output into typed rows from [`rows`].
//!
//! | Metric | Collection | Interval | Row |
//! |---|---|---|---|
//! | sales | orders | required | [`SalesRow`] |
//! | sales-growth | orders | required | [`SalesGrowthRow`] |
//! | new-customers | customers | required | [`NewCustomersRow`] |
//! | repeat-customers | orders | required | [`RepeatCustomersRow`] |
//! | geographical-distribution | customers | none | [`CityRow`] |
//! | customer-lifetime-value | customers | ignored (monthly) | [`LifetimeValueRow`] |

pub mod pipelines;
pub mod rows;

use core::fmt;
use core::str::FromStr;

use rq_analytics_core::{CoercionError, CoercionPolicy, Collection, Interval, IntervalError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::db::{AggregateError, RecordSource};
use crate::pipeline::{Pipeline, Stage, decode_rows};

pub use rows::{
    CityRow, LifetimeValueRow, NewCustomersRow, RepeatCustomersRow, SalesGrowthRow, SalesRow,
};

/// Errors that can occur while computing a metric.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The interval was missing or not a supported granularity.
    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    /// The aggregation failed in the store or during coercion.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Aggregation output did not have the expected row shape.
    #[error("unexpected row shape: {0}")]
    RowShape(#[from] serde_json::Error),
}

impl PipelineError {
    /// The coercion failure behind this error, if any.
    #[must_use]
    pub const fn coercion(&self) -> Option<&CoercionError> {
        match self {
            Self::Aggregate(AggregateError::Coercion(err)) => Some(err),
            _ => None,
        }
    }
}

/// Analytics over one record source.
#[derive(Clone, Copy)]
pub struct Analytics<'a> {
    source: &'a dyn RecordSource,
    policy: CoercionPolicy,
}

impl fmt::Debug for Analytics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'a> Analytics<'a> {
    /// Create an analytics service.
    #[must_use]
    pub const fn new(source: &'a dyn RecordSource, policy: CoercionPolicy) -> Self {
        Self { source, policy }
    }

    /// Sales totals per interval bucket.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInterval`] for a missing or unknown
    /// interval, otherwise any aggregation failure.
    #[instrument(skip(self))]
    pub async fn sales_totals(&self, interval: Option<&str>) -> Result<Vec<SalesRow>, PipelineError> {
        let interval = Interval::resolve(interval)?;
        self.run(Collection::Orders, pipelines::sales_totals(interval)).await
    }

    /// Per-bucket sales totals folded into fixed growth ranges.
    ///
    /// # Errors
    ///
    /// Same as [`Analytics::sales_totals`].
    #[instrument(skip(self))]
    pub async fn sales_growth(
        &self,
        interval: Option<&str>,
    ) -> Result<Vec<SalesGrowthRow>, PipelineError> {
        let interval = Interval::resolve(interval)?;
        self.run(Collection::Orders, pipelines::sales_growth(interval)).await
    }

    /// New customers per interval bucket.
    ///
    /// # Errors
    ///
    /// Same as [`Analytics::sales_totals`].
    #[instrument(skip(self))]
    pub async fn new_customers(
        &self,
        interval: Option<&str>,
    ) -> Result<Vec<NewCustomersRow>, PipelineError> {
        let interval = Interval::resolve(interval)?;
        self.run(Collection::Customers, pipelines::new_customers(interval)).await
    }

    /// Customers with more than one order inside the same interval bucket.
    ///
    /// # Errors
    ///
    /// Same as [`Analytics::sales_totals`].
    #[instrument(skip(self))]
    pub async fn repeat_customers(
        &self,
        interval: Option<&str>,
    ) -> Result<Vec<RepeatCustomersRow>, PipelineError> {
        let interval = Interval::resolve(interval)?;
        self.run(Collection::Orders, pipelines::repeat_customers(interval)).await
    }

    /// Customer counts per default-address city.
    ///
    /// # Errors
    ///
    /// Returns any aggregation failure.
    #[instrument(skip(self))]
    pub async fn geographical_distribution(&self) -> Result<Vec<CityRow>, PipelineError> {
        self.run(Collection::Customers, pipelines::geographical_distribution()).await
    }

    /// Lifetime value per signup-month cohort.
    ///
    /// Always monthly; there is no interval parameter.
    ///
    /// # Errors
    ///
    /// Returns any aggregation failure.
    #[instrument(skip(self))]
    pub async fn customer_lifetime_value(&self) -> Result<Vec<LifetimeValueRow>, PipelineError> {
        self.run(Collection::Customers, pipelines::customer_lifetime_value()).await
    }

    /// Compute any metric and return its rows as JSON.
    ///
    /// `interval` is ignored by metrics that do not take one.
    ///
    /// # Errors
    ///
    /// Same as the per-metric methods.
    pub async fn metric(&self, metric: Metric, interval: Option<&str>) -> Result<Value, PipelineError> {
        match metric {
            Metric::Sales => to_json(self.sales_totals(interval).await?),
            Metric::SalesGrowth => to_json(self.sales_growth(interval).await?),
            Metric::NewCustomers => to_json(self.new_customers(interval).await?),
            Metric::RepeatCustomers => to_json(self.repeat_customers(interval).await?),
            Metric::GeographicalDistribution => to_json(self.geographical_distribution().await?),
            Metric::CustomerLifetimeValue => to_json(self.customer_lifetime_value().await?),
        }
    }

    async fn run<T: DeserializeOwned>(
        &self,
        collection: Collection,
        stages: Vec<Stage>,
    ) -> Result<Vec<T>, PipelineError> {
        let pipeline = Pipeline::new(stages, self.policy);
        let rows = self.source.aggregate(collection, &pipeline).await?;
        tracing::debug!(collection = %collection, rows = rows.len(), "Pipeline produced rows");
        Ok(decode_rows(rows)?)
    }
}

fn to_json<T: Serialize>(rows: Vec<T>) -> Result<Value, PipelineError> {
    Ok(serde_json::to_value(rows)?)
}

/// The metrics exposed under `/api/analytics/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sales,
    SalesGrowth,
    NewCustomers,
    RepeatCustomers,
    GeographicalDistribution,
    CustomerLifetimeValue,
}

impl Metric {
    /// All metrics in route order.
    pub const ALL: [Self; 6] = [
        Self::Sales,
        Self::SalesGrowth,
        Self::NewCustomers,
        Self::RepeatCustomers,
        Self::GeographicalDistribution,
        Self::CustomerLifetimeValue,
    ];

    /// Route segment and CLI name (e.g., `sales-growth`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::SalesGrowth => "sales-growth",
            Self::NewCustomers => "new-customers",
            Self::RepeatCustomers => "repeat-customers",
            Self::GeographicalDistribution => "geographical-distribution",
            Self::CustomerLifetimeValue => "customer-lifetime-value",
        }
    }

    /// Whether the metric requires an `interval` parameter.
    #[must_use]
    pub const fn takes_interval(&self) -> bool {
        !matches!(
            self,
            Self::GeographicalDistribution | Self::CustomerLifetimeValue
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rq_analytics_core::{BucketKey, Customer, CustomerId, Money, MoneySet, Order, OrderId};
    use serde_json::json;

    use super::*;
    use crate::db::{InMemoryRecordSource, StoreError};

    fn order(id: i64, customer: Option<i64>, created_at: &str, amount: &str) -> Order {
        Order {
            id: OrderId::new(id),
            total_price_set: MoneySet::shop(Money {
                amount: amount.to_string(),
                currency_code: "USD".to_string(),
            }),
            created_at: created_at.to_string(),
            customer_id: customer.map(CustomerId::new),
        }
    }

    fn customer(id: i64, created_at: &str, total_spent: &str) -> Customer {
        Customer {
            id: CustomerId::new(id),
            first_name: None,
            last_name: None,
            email: None,
            created_at: created_at.to_string(),
            orders_count: 0,
            total_spent: total_spent.to_string(),
            default_address: None,
        }
    }

    fn orders_source(orders: &[Order]) -> InMemoryRecordSource {
        InMemoryRecordSource::new()
            .with_records(Collection::Orders, orders)
            .unwrap()
    }

    fn lenient(source: &InMemoryRecordSource) -> Analytics<'_> {
        Analytics::new(source, CoercionPolicy::Lenient)
    }

    fn total_for(rows: &[SalesRow], bucket: i64) -> f64 {
        rows.iter()
            .filter(|row| row.bucket == bucket)
            .map(|row| row.total_sales)
            .sum()
    }

    #[tokio::test]
    async fn test_sales_totals_per_month() {
        let source = orders_source(&[
            order(1, Some(1), "2023-07-15T10:00:00Z", "10.25"),
            order(2, Some(2), "2023-07-20T10:00:00Z", "4.75"),
            order(3, Some(1), "2023-03-01T00:00:00-05:00", "2.50"),
        ]);

        let rows = lenient(&source).sales_totals(Some("monthly")).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert!((total_for(&rows, 7) - 15.0).abs() < f64::EPSILON);
        assert!((total_for(&rows, 3) - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_sales_totals_is_additive() {
        let first = [
            order(1, Some(1), "2024-01-03T00:00:00Z", "1.25"),
            order(2, Some(2), "2024-02-03T00:00:00Z", "8.00"),
        ];
        let second = [
            order(3, Some(3), "2024-01-09T00:00:00Z", "3.50"),
            order(4, Some(4), "2024-03-09T00:00:00Z", "0.75"),
        ];
        let both: Vec<Order> = first.iter().chain(second.iter()).cloned().collect();

        let a = orders_source(&first);
        let b = orders_source(&second);
        let ab = orders_source(&both);
        let rows_a = lenient(&a).sales_totals(Some("monthly")).await.unwrap();
        let rows_b = lenient(&b).sales_totals(Some("monthly")).await.unwrap();
        let rows_ab = lenient(&ab).sales_totals(Some("monthly")).await.unwrap();

        for month in 1..=3 {
            let expected = total_for(&rows_a, month) + total_for(&rows_b, month);
            assert!((total_for(&rows_ab, month) - expected).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_unparsable_amount_counts_as_zero_when_lenient() {
        let source = orders_source(&[
            order(1, Some(1), "2023-07-15T10:00:00Z", "abc"),
            order(2, Some(1), "2023-07-16T10:00:00Z", "5.00"),
        ]);

        let rows = lenient(&source).sales_totals(Some("monthly")).await.unwrap();

        assert_eq!(
            rows,
            vec![SalesRow {
                bucket: 7,
                total_sales: 5.0
            }]
        );
    }

    #[tokio::test]
    async fn test_unparsable_amount_fails_when_strict() {
        let source = orders_source(&[order(1, Some(1), "2023-07-15T10:00:00Z", "abc")]);

        let err = Analytics::new(&source, CoercionPolicy::Strict)
            .sales_totals(Some("monthly"))
            .await
            .unwrap_err();

        assert!(matches!(err.coercion(), Some(CoercionError::Amount(_))));
    }

    #[tokio::test]
    async fn test_unparsable_timestamp_is_excluded_when_lenient() {
        let source = orders_source(&[
            order(1, Some(1), "not a date", "1.00"),
            order(2, Some(1), "2023-07-15T10:00:00Z", "2.00"),
        ]);

        let rows = lenient(&source).sales_totals(Some("daily")).await.unwrap();
        assert_eq!(
            rows,
            vec![SalesRow {
                bucket: 15,
                total_sales: 2.0
            }]
        );

        let err = Analytics::new(&source, CoercionPolicy::Strict)
            .sales_totals(Some("daily"))
            .await
            .unwrap_err();
        assert!(matches!(err.coercion(), Some(CoercionError::Timestamp(_))));
    }

    #[tokio::test]
    async fn test_null_or_missing_signup_date_fails_when_strict() {
        let source = InMemoryRecordSource::new().with_documents(
            Collection::Customers,
            vec![
                json!({"id": 1, "created_at": "2023-07-15T00:00:00Z", "total_spent": "1.00"}),
                json!({"id": 2, "created_at": null, "total_spent": "2.00"}),
                json!({"id": 3, "total_spent": "4.00"}),
            ],
        );
        let strict = Analytics::new(&source, CoercionPolicy::Strict);

        let err = strict.new_customers(Some("monthly")).await.unwrap_err();
        assert!(matches!(err.coercion(), Some(CoercionError::Timestamp(_))));
        let err = strict.customer_lifetime_value().await.unwrap_err();
        assert!(matches!(err.coercion(), Some(CoercionError::Timestamp(_))));

        let rows = lenient(&source).new_customers(Some("monthly")).await.unwrap();
        assert_eq!(rows, vec![NewCustomersRow { bucket: 7, count: 1 }]);
    }

    #[tokio::test]
    async fn test_sales_growth_folds_keys_into_ranges() {
        let source = orders_source(&[
            order(1, Some(1), "2024-01-10T00:00:00Z", "1.00"),
            order(2, Some(1), "2024-02-10T00:00:00Z", "2.00"),
            order(3, Some(1), "2024-05-10T00:00:00Z", "4.00"),
            order(4, Some(1), "2024-12-10T00:00:00Z", "8.00"),
        ]);

        let rows = lenient(&source).sales_growth(Some("monthly")).await.unwrap();

        assert_eq!(
            rows,
            vec![
                SalesGrowthRow {
                    range: BucketKey::Int(1),
                    total_sales: 1.0
                },
                SalesGrowthRow {
                    range: BucketKey::Int(2),
                    total_sales: 2.0
                },
                SalesGrowthRow {
                    range: BucketKey::other(),
                    total_sales: 12.0
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_new_customers_per_quarter() {
        let source = InMemoryRecordSource::new()
            .with_records(
                Collection::Customers,
                &[
                    customer(1, "2023-01-15T00:00:00Z", "0.00"),
                    customer(2, "2023-03-31T23:59:59Z", "0.00"),
                    customer(3, "2023-07-15T00:00:00Z", "0.00"),
                ],
            )
            .unwrap();

        let mut rows = lenient(&source).new_customers(Some("quarterly")).await.unwrap();
        rows.sort_by_key(|row| row.bucket);

        assert_eq!(
            rows,
            vec![
                NewCustomersRow { bucket: 1, count: 2 },
                NewCustomersRow { bucket: 3, count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_repeat_customers_counts_customers_not_orders() {
        // Customer 1 orders twice in January, customer 2 once.
        let source = orders_source(&[
            order(1, Some(1), "2024-01-02T00:00:00Z", "1.00"),
            order(2, Some(1), "2024-01-20T00:00:00Z", "1.00"),
            order(3, Some(2), "2024-01-05T00:00:00Z", "1.00"),
        ]);

        let rows = lenient(&source).repeat_customers(Some("monthly")).await.unwrap();

        assert_eq!(
            rows,
            vec![RepeatCustomersRow {
                bucket: 1,
                repeat_customers_count: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_repeat_customers_ignores_guest_orders() {
        let source = orders_source(&[
            order(1, None, "2024-01-02T00:00:00Z", "1.00"),
            order(2, None, "2024-01-03T00:00:00Z", "1.00"),
            order(3, Some(7), "2024-01-04T00:00:00Z", "1.00"),
            order(4, Some(7), "2024-02-04T00:00:00Z", "1.00"),
        ]);

        let rows = lenient(&source).repeat_customers(Some("monthly")).await.unwrap();
        assert!(rows.is_empty());

        let rows = lenient(&source).repeat_customers(Some("yearly")).await.unwrap();
        assert_eq!(
            rows,
            vec![RepeatCustomersRow {
                bucket: 2024,
                repeat_customers_count: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_geographical_distribution_groups_missing_cities() {
        let source = InMemoryRecordSource::new().with_documents(
            Collection::Customers,
            vec![
                json!({"id": 1, "default_address": {"city": "Austin"}}),
                json!({"id": 2, "default_address": {"city": "Austin"}}),
                json!({"id": 3, "default_address": {"city": null}}),
                json!({"id": 4}),
            ],
        );

        let rows = lenient(&source).geographical_distribution().await.unwrap();

        assert_eq!(
            rows,
            vec![
                CityRow {
                    city: BucketKey::from("Austin"),
                    count: 2
                },
                CityRow {
                    city: BucketKey::Missing,
                    count: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_geographical_distribution_keeps_odd_city_values() {
        let source = InMemoryRecordSource::new().with_documents(
            Collection::Customers,
            vec![
                json!({"id": 1, "default_address": {"city": {"name": "Austin"}}}),
                json!({"id": 2, "default_address": {"city": true}}),
                json!({"id": 3, "default_address": {"city": {"name": "Austin"}}}),
            ],
        );

        let rows = Analytics::new(&source, CoercionPolicy::Strict)
            .geographical_distribution()
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                CityRow {
                    city: BucketKey::Composite(json!({"name": "Austin"})),
                    count: 2
                },
                CityRow {
                    city: BucketKey::Composite(json!(true)),
                    count: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_customer_lifetime_value_by_signup_month() {
        let source = InMemoryRecordSource::new()
            .with_records(
                Collection::Customers,
                &[
                    customer(1, "2023-07-01T00:00:00Z", "100.50"),
                    customer(2, "2024-07-30T00:00:00Z", "20.00"),
                    customer(3, "2023-02-11T00:00:00Z", "5.25"),
                ],
            )
            .unwrap();

        let rows = lenient(&source).customer_lifetime_value().await.unwrap();

        assert_eq!(
            rows,
            vec![
                LifetimeValueRow {
                    month: 7,
                    lifetime_value: 120.5
                },
                LifetimeValueRow {
                    month: 2,
                    lifetime_value: 5.25
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_lifetime_value_ignores_interval() {
        let source = InMemoryRecordSource::new()
            .with_records(
                Collection::Customers,
                &[customer(1, "2023-07-01T00:00:00Z", "10.00")],
            )
            .unwrap();
        let analytics = lenient(&source);

        let daily = analytics
            .metric(Metric::CustomerLifetimeValue, Some("daily"))
            .await
            .unwrap();
        let yearly = analytics
            .metric(Metric::CustomerLifetimeValue, Some("yearly"))
            .await
            .unwrap();
        let bogus = analytics
            .metric(Metric::CustomerLifetimeValue, Some("hourly"))
            .await
            .unwrap();

        assert_eq!(daily, yearly);
        assert_eq!(daily, bogus);
        assert_eq!(daily, json!([{"_id": 7, "lifetimeValue": 10.0}]));
    }

    #[tokio::test]
    async fn test_invalid_interval_fails_every_bucketed_metric() {
        let source = orders_source(&[order(1, Some(1), "2024-01-02T00:00:00Z", "1.00")]);
        let analytics = lenient(&source);

        for metric in Metric::ALL.into_iter().filter(Metric::takes_interval) {
            for interval in [Some("weekly"), Some("Monthly"), None] {
                let err = analytics.metric(metric, interval).await.unwrap_err();
                assert!(
                    matches!(err, PipelineError::InvalidInterval(_)),
                    "{metric} with {interval:?} gave {err}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let source = InMemoryRecordSource::unavailable();
        let err = lenient(&source).geographical_distribution().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Aggregate(AggregateError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), metric);
        }
        assert!("revenue".parse::<Metric>().is_err());
        assert!(!Metric::GeographicalDistribution.takes_interval());
        assert!(Metric::RepeatCustomers.takes_interval());
    }
}
