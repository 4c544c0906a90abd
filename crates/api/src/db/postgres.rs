//! `PostgreSQL` record source backed by JSONB document tables.

use async_trait::async_trait;
use rq_analytics_core::Collection;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use super::{Filter, RecordSource, StoreError};

/// Record source reading documents from `analytics.shopify_*` tables.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    /// Create a record source over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    #[instrument(skip(self, filter))]
    async fn query(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        // Table names come from a closed enum, never from request input.
        // Using runtime query to avoid SQLx offline mode cache requirements
        let sql = format!(
            "SELECT document FROM {} WHERE document @> $1 ORDER BY id",
            collection.table_name()
        );

        let rows = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(Json(filter.as_json()))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// Write access to one document table, used by the seeding CLI.
///
/// The analytics service itself never writes; this exists so fixtures and
/// exports can be loaded into a fresh database.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
    collection: Collection,
}

impl<'a> CollectionRepository<'a> {
    /// Create a repository for one collection.
    #[must_use]
    pub const fn new(pool: &'a PgPool, collection: Collection) -> Self {
        Self { pool, collection }
    }

    /// Insert documents in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if any insert fails; nothing is written
    /// in that case.
    #[instrument(skip(self, documents), fields(collection = %self.collection, count = documents.len()))]
    pub async fn insert_many(&self, documents: &[Value]) -> Result<u64, StoreError> {
        let sql = format!(
            "INSERT INTO {} (document) VALUES ($1)",
            self.collection.table_name()
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for document in documents {
            inserted += sqlx::query(&sql)
                .bind(Json(document))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// Remove every document from the collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the statement fails.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        let sql = format!("TRUNCATE {}", self.collection.table_name());
        sqlx::query(&sql).execute(self.pool).await?;
        Ok(())
    }

    /// Count documents in the collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.collection.table_name());
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
