//! Record sources: read-only access to the Shopify document collections.
//!
//! # Collections
//!
//! - `shopifyCustomers` - customer documents (`analytics.shopify_customers`)
//! - `shopifyOrders` - order documents (`analytics.shopify_orders`)
//! - `shopifyProducts` - product documents (`analytics.shopify_products`)
//!
//! # Implementations
//!
//! - [`PgRecordSource`] - `PostgreSQL` JSONB tables, the production store
//! - [`InMemoryRecordSource`] - documents held in memory, for tests and
//!   offline reports
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p rq-analytics-cli -- migrate
//! ```

pub mod filter;
pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use rq_analytics_core::{Collection, CoercionError};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::pipeline::{EngineError, Pipeline};

pub use filter::Filter;
pub use memory::InMemoryRecordSource;
pub use postgres::PgRecordSource;

/// Errors that can occur while reading from a record source.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while running an aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Reading the collection failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value failed coercion under the strict policy.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// The pipeline definition is unusable.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),
}

impl From<EngineError> for AggregateError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Coercion(err) => Self::Coercion(err),
            EngineError::InvalidStage(msg) => Self::InvalidPipeline(msg),
        }
    }
}

/// Read-only access to the document collections.
///
/// Implementations must support concurrent calls from many in-flight
/// requests; the analytics pipelines never write.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Return every document in `collection` matching `filter`.
    async fn query(&self, collection: Collection, filter: &Filter)
    -> Result<Vec<Value>, StoreError>;

    /// Run an aggregation pipeline over a collection.
    ///
    /// The default implementation reads the whole collection and runs the
    /// stage engine in process.
    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
    ) -> Result<Vec<Value>, AggregateError> {
        let documents = self.query(collection, &Filter::all()).await?;
        let scanned = documents.len();
        let output = pipeline.execute(documents)?;

        if !output.stats.is_clean() {
            tracing::warn!(
                collection = %collection,
                invalid_timestamps = output.stats.invalid_timestamps,
                invalid_amounts = output.stats.invalid_amounts,
                "Swallowed coercion failures during aggregation"
            );
        }
        tracing::debug!(
            collection = %collection,
            scanned,
            rows = output.rows.len(),
            "Aggregation complete"
        );

        Ok(output.rows)
    }

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
