//! Integration tests for RQ Analytics.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (no external services)
//! cargo test -p rq-analytics-integration-tests
//!
//! # Black-box tests against a running server and a disposable database
//! ANALYTICS_BASE_URL=http://localhost:5000 \
//! ANALYTICS_DATABASE_URL=postgres://localhost/analytics_test \
//!     cargo test -p rq-analytics-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `analytics_api` - HTTP tests against an in-process server over the fixtures
//! - `fixtures` - Pipeline results over the fixture files
//! - `live_server` - Tests against a running server (ignored by default)
//! - `postgres_source` - `PostgreSQL` record source tests (ignored by default)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use rq_analytics_api::config::AnalyticsConfig;
use rq_analytics_api::db::{InMemoryRecordSource, RecordSource};
use rq_analytics_api::state::AppState;

/// Directory holding `customers.json`, `orders.json` and `products.json`.
#[must_use]
pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Load the fixture files into an in-memory record source.
///
/// # Panics
///
/// Panics if the fixture files are missing or malformed.
pub async fn fixture_source() -> InMemoryRecordSource {
    InMemoryRecordSource::load_dir(&fixture_dir())
        .await
        .expect("Failed to load fixtures")
}

/// Configuration for in-process servers; the database URL is never used.
///
/// # Panics
///
/// Panics if an override is not a valid configuration value.
#[must_use]
pub fn test_config(overrides: &[(&str, &str)]) -> AnalyticsConfig {
    AnalyticsConfig::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| (*v).to_string())
            .or_else(|| (key == "ANALYTICS_DATABASE_URL").then(|| "postgres://unused".to_string()))
    })
    .expect("Invalid test configuration")
}

/// Serve the analytics router on an ephemeral local port.
///
/// Returns the base URL (e.g., `http://127.0.0.1:49152`).
///
/// # Panics
///
/// Panics if no local port can be bound.
pub async fn spawn_app(source: impl RecordSource + 'static, config: AnalyticsConfig) -> String {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("Failed to bind to address");
    let addr = listener.local_addr().expect("Failed to read local address");

    let app = rq_analytics_api::build_router(AppState::new(config, Arc::new(source)));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server error");
    });

    format!("http://{addr}")
}

/// Base URL of an externally running server (for ignored tests).
#[must_use]
pub fn live_base_url() -> String {
    std::env::var("ANALYTICS_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}
