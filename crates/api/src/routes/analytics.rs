//! Analytics metric handlers.
//!
//! Each handler resolves the `interval` query parameter (where the metric
//! takes one), runs its pipeline under the request timeout and returns the
//! rows as a JSON array.

use std::future::Future;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use crate::analytics::{
    CityRow, LifetimeValueRow, NewCustomersRow, PipelineError, RepeatCustomersRow, SalesGrowthRow,
    SalesRow,
};
use crate::error::AppError;
use crate::state::AppState;

/// Query parameters shared by the analytics routes.
///
/// Handlers take `Result<Query<IntervalQuery>, QueryRejection>` so a
/// malformed query string is answered with the usual JSON error record.
#[derive(Debug, Default, Deserialize)]
pub struct IntervalQuery {
    /// `daily`, `monthly`, `quarterly` or `yearly`.
    pub interval: Option<String>,
}

impl IntervalQuery {
    fn interval(&self) -> Option<&str> {
        self.interval.as_deref()
    }
}

/// Run a pipeline future under the configured request timeout.
async fn within_timeout<T>(
    state: &AppState,
    pipeline: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, AppError> {
    let limit = state.config().request_timeout;
    match tokio::time::timeout(limit, pipeline).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Timeout(limit)),
    }
}

/// `GET /api/analytics/sales`
pub async fn sales(
    State(state): State<AppState>,
    query: Result<Query<IntervalQuery>, QueryRejection>,
) -> Result<Json<Vec<SalesRow>>, AppError> {
    let Query(query) = query?;
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.sales_totals(query.interval())).await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/sales-growth`
pub async fn sales_growth(
    State(state): State<AppState>,
    query: Result<Query<IntervalQuery>, QueryRejection>,
) -> Result<Json<Vec<SalesGrowthRow>>, AppError> {
    let Query(query) = query?;
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.sales_growth(query.interval())).await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/new-customers`
pub async fn new_customers(
    State(state): State<AppState>,
    query: Result<Query<IntervalQuery>, QueryRejection>,
) -> Result<Json<Vec<NewCustomersRow>>, AppError> {
    let Query(query) = query?;
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.new_customers(query.interval())).await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/repeat-customers`
pub async fn repeat_customers(
    State(state): State<AppState>,
    query: Result<Query<IntervalQuery>, QueryRejection>,
) -> Result<Json<Vec<RepeatCustomersRow>>, AppError> {
    let Query(query) = query?;
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.repeat_customers(query.interval())).await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/geographical-distribution`
pub async fn geographical_distribution(
    State(state): State<AppState>,
) -> Result<Json<Vec<CityRow>>, AppError> {
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.geographical_distribution()).await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/customer-lifetime-value`
///
/// Accepts `interval` for compatibility but always groups by signup month.
pub async fn customer_lifetime_value(
    State(state): State<AppState>,
    query: Result<Query<IntervalQuery>, QueryRejection>,
) -> Result<Json<Vec<LifetimeValueRow>>, AppError> {
    let Query(query) = query?;
    if let Some(interval) = query.interval() {
        tracing::debug!(interval, "Ignoring interval for lifetime value cohorts");
    }
    let analytics = state.analytics();
    let rows = within_timeout(&state, analytics.customer_lifetime_value()).await?;
    Ok(Json(rows))
}
