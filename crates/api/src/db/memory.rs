//! In-memory record source.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rq_analytics_core::Collection;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{Filter, RecordSource, StoreError};

/// Errors loading fixture files.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} must contain a JSON array of documents")]
    NotAnArray { path: String },
}

/// Record source over documents held in memory.
///
/// Cheap to clone; clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    collections: Arc<HashMap<Collection, Vec<Value>>>,
    offline: bool,
}

impl InMemoryRecordSource {
    /// Create an empty record source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A record source that fails every call, as if the store were down.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            collections: Arc::default(),
            offline: true,
        }
    }

    /// Replace the documents of one collection.
    #[must_use]
    pub fn with_documents(mut self, collection: Collection, documents: Vec<Value>) -> Self {
        Arc::make_mut(&mut self.collections).insert(collection, documents);
        self
    }

    /// Replace the documents of one collection with serialized records.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if a record fails to serialize.
    pub fn with_records<T: Serialize>(
        self,
        collection: Collection,
        records: &[T],
    ) -> serde_json::Result<Self> {
        let documents = records
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(self.with_documents(collection, documents))
    }

    /// Load `customers.json`, `orders.json` and `products.json` from a directory.
    ///
    /// Each file holds a JSON array of documents. Missing files leave their
    /// collection empty.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] if a present file cannot be read or parsed.
    pub async fn load_dir(dir: &Path) -> Result<Self, FixtureError> {
        let mut source = Self::new();
        for collection in Collection::ALL {
            let path = dir.join(fixture_file_name(collection));
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::debug!(path = %path.display(), "Fixture file not found, collection left empty");
                continue;
            }
            let documents = read_documents(&path).await?;
            tracing::info!(collection = %collection, count = documents.len(), "Loaded fixture");
            source = source.with_documents(collection, documents);
        }
        Ok(source)
    }

    /// Number of documents held for a collection.
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, Vec::len)
    }
}

/// The fixture file name for a collection (e.g., `orders.json`).
#[must_use]
pub const fn fixture_file_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Customers => "customers.json",
        Collection::Orders => "orders.json",
        Collection::Products => "products.json",
    }
}

/// Read a JSON array of documents from a file.
///
/// # Errors
///
/// Returns a [`FixtureError`] if the file cannot be read, is not JSON, or is
/// not an array.
pub async fn read_documents(path: &Path) -> Result<Vec<Value>, FixtureError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FixtureError::Io {
            path: display.clone(),
            source,
        })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| FixtureError::Parse {
        path: display.clone(),
        source,
    })?;
    match value {
        Value::Array(documents) => Ok(documents),
        _ => Err(FixtureError::NotAnArray { path: display }),
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn query(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Value>, StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        let documents = self.collections.get(&collection).map_or(&[][..], Vec::as_slice);
        Ok(documents
            .iter()
            .filter(|doc| filter.is_empty() || filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}
