//! Run one analytics metric and print its rows as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Against the database
//! rq-cli report sales --interval monthly
//!
//! # Against exported fixture files (customers.json, orders.json, products.json)
//! rq-cli report repeat-customers --interval quarterly --fixture ./exports
//! ```

use std::path::Path;

use rq_analytics_api::analytics::{Analytics, Metric};
use rq_analytics_api::db::{InMemoryRecordSource, PgRecordSource, RecordSource};
use rq_analytics_core::CoercionPolicy;
use serde_json::Value;

/// Compute a metric and print it to stdout.
///
/// # Errors
///
/// Returns an error if the record source cannot be opened or the metric
/// fails (including an invalid interval).
pub async fn run(
    metric: Metric,
    interval: Option<&str>,
    fixture: Option<&Path>,
    policy: CoercionPolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = match fixture {
        Some(dir) => {
            let source = InMemoryRecordSource::load_dir(dir).await?;
            compute(&source, metric, interval, policy).await?
        }
        None => {
            let source = PgRecordSource::new(super::connect().await?);
            compute(&source, metric, interval, policy).await?
        }
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}

/// Compute a metric against any record source.
///
/// # Errors
///
/// Returns the pipeline error for an invalid interval or a failed aggregation.
pub async fn compute(
    source: &dyn RecordSource,
    metric: Metric,
    interval: Option<&str>,
    policy: CoercionPolicy,
) -> Result<Value, Box<dyn std::error::Error>> {
    if !metric.takes_interval() && interval.is_some() {
        tracing::warn!(%metric, "Metric does not take an interval; ignoring --interval");
    }

    let rows = Analytics::new(source, policy).metric(metric, interval).await?;
    tracing::info!(%metric, rows = rows.as_array().map_or(0, Vec::len), "Report computed");
    Ok(rows)
}
