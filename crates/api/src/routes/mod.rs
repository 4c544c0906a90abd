//! HTTP route handlers for the analytics API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                     - Liveness check
//! GET  /health/ready                               - Readiness check (record source ping)
//!
//! # Analytics (JSON arrays of rows)
//! GET  /api/analytics/sales?interval=               - Sales totals per bucket
//! GET  /api/analytics/sales-growth?interval=        - Sales totals folded into growth ranges
//! GET  /api/analytics/new-customers?interval=       - New customers per bucket
//! GET  /api/analytics/repeat-customers?interval=    - Repeat customers per bucket
//! GET  /api/analytics/geographical-distribution     - Customers per city
//! GET  /api/analytics/customer-lifetime-value       - Lifetime value per signup month
//! ```

pub mod analytics;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Create the analytics routes router.
pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(analytics::sales))
        .route("/sales-growth", get(analytics::sales_growth))
        .route("/new-customers", get(analytics::new_customers))
        .route("/repeat-customers", get(analytics::repeat_customers))
        .route(
            "/geographical-distribution",
            get(analytics::geographical_distribution),
        )
        .route(
            "/customer-lifetime-value",
            get(analytics::customer_lifetime_value),
        )
}

/// Create all routes for the analytics API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/analytics", analytics_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the record source is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.source().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
