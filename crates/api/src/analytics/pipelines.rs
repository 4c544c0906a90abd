//! Stage lists for the six analytics pipelines.
//!
//! Each builder returns the stages only; the caller pairs them with a
//! coercion policy and runs them against a record source.

use rq_analytics_core::Interval;
use serde_json::json;

use crate::pipeline::{Accumulator, Expr, Predicate, Stage, other_bucket};

/// Timestamp field shared by orders and customers.
pub const CREATED_AT: &str = "created_at";

/// Path of the order amount string.
pub const ORDER_AMOUNT: &str = "total_price_set.shop_money.amount";

/// Range boundaries used to re-bucket per-interval sales totals.
///
/// Ranges are `[0,1) [1,2) [2,3) [3,4)`; every other bucket key lands in
/// `"Other"`. These only line up with quarterly keys (1-4); monthly, daily and
/// yearly keys of 4 and above all collapse into `"Other"`.
pub const SALES_GROWTH_BOUNDARIES: [i64; 5] = [0, 1, 2, 3, 4];

/// Interval used for lifetime-value cohorts whatever the caller asks for.
pub const COHORT_INTERVAL: Interval = Interval::Monthly;

/// Per-bucket sales totals: `{_id: bucket, totalSales}`.
#[must_use]
pub fn sales_totals(interval: Interval) -> Vec<Stage> {
    vec![
        Stage::normalize_timestamp(CREATED_AT),
        Stage::group(
            Expr::bucket(interval, CREATED_AT),
            &[("totalSales", Accumulator::Sum(Expr::to_double(ORDER_AMOUNT)))],
        ),
    ]
}

/// Per-bucket sales totals folded into [`SALES_GROWTH_BOUNDARIES`] ranges.
#[must_use]
pub fn sales_growth(interval: Interval) -> Vec<Stage> {
    let mut stages = sales_totals(interval);
    stages.push(Stage::sort_ascending("_id"));
    stages.push(Stage::Bucket {
        group_by: Expr::field("_id"),
        boundaries: SALES_GROWTH_BOUNDARIES.to_vec(),
        default: other_bucket(),
        output: vec![(
            "totalSales".to_string(),
            Accumulator::Sum(Expr::field("totalSales")),
        )],
    });
    stages
}

/// Customers created per bucket: `{_id: bucket, count}`.
#[must_use]
pub fn new_customers(interval: Interval) -> Vec<Stage> {
    vec![
        Stage::normalize_timestamp(CREATED_AT),
        Stage::group(
            Expr::bucket(interval, CREATED_AT),
            &[("count", Accumulator::Count)],
        ),
    ]
}

/// Customers with more than one order in the same bucket:
/// `{_id: bucket, repeatCustomersCount}`.
///
/// Guest orders (no `customer_id`) are excluded before pairing.
#[must_use]
pub fn repeat_customers(interval: Interval) -> Vec<Stage> {
    vec![
        Stage::Match(Predicate::Exists("customer_id".to_string())),
        Stage::normalize_timestamp(CREATED_AT),
        Stage::group(
            Expr::Object(vec![
                ("customerId".to_string(), Expr::field("customer_id")),
                ("interval".to_string(), Expr::bucket(interval, CREATED_AT)),
            ]),
            &[("orderCount", Accumulator::Count)],
        ),
        Stage::Match(Predicate::Gt("orderCount".to_string(), json!(1))),
        Stage::group(
            Expr::field("_id.interval"),
            &[("repeatCustomersCount", Accumulator::Count)],
        ),
    ]
}

/// Customers per default-address city: `{_id: city | null, count}`.
#[must_use]
pub fn geographical_distribution() -> Vec<Stage> {
    vec![Stage::group(
        Expr::field("default_address.city"),
        &[("count", Accumulator::Count)],
    )]
}

/// Summed `total_spent` per signup-month cohort: `{_id: month, lifetimeValue}`.
#[must_use]
pub fn customer_lifetime_value() -> Vec<Stage> {
    vec![
        Stage::normalize_timestamp(CREATED_AT),
        Stage::group(
            Expr::bucket(COHORT_INTERVAL, CREATED_AT),
            &[("lifetimeValue", Accumulator::Sum(Expr::to_double("total_spent")))],
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_growth_extends_sales_totals() {
        let totals = sales_totals(Interval::Quarterly);
        let growth = sales_growth(Interval::Quarterly);
        assert_eq!(&growth[..totals.len()], totals.as_slice());
        let names: Vec<&str> = growth.iter().map(Stage::name).collect();
        assert_eq!(names, ["normalize_timestamp", "group", "sort", "bucket"]);
    }

    #[test]
    fn test_repeat_customers_reads_pass_one_bucket() {
        let stages = repeat_customers(Interval::Monthly);
        assert_eq!(
            stages.last(),
            Some(&Stage::group(
                Expr::field("_id.interval"),
                &[("repeatCustomersCount", Accumulator::Count)]
            ))
        );
    }

    #[test]
    fn test_lifetime_value_is_monthly() {
        assert_eq!(COHORT_INTERVAL, Interval::Monthly);
        assert!(customer_lifetime_value().iter().any(|stage| matches!(
            stage,
            Stage::Group { key: Expr::Bucket(Interval::Monthly, _), .. }
        )));
    }

    #[test]
    fn test_growth_boundaries() {
        assert_eq!(SALES_GROWTH_BOUNDARIES, [0, 1, 2, 3, 4]);
    }
}
