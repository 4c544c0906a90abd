//! Load exported Shopify documents into the analytics database.
//!
//! Each file is a JSON array of documents as exported from Shopify (or the
//! previous document store). Documents are stored as-is; ones that do not
//! match the expected shape are still inserted so the coercion policy can
//! decide what to do with them, but they are counted and reported.

use std::path::Path;

use rq_analytics_api::db::memory::read_documents;
use rq_analytics_api::db::postgres::CollectionRepository;
use rq_analytics_core::{Collection, Customer, Order, Product};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

/// One collection to seed and the file holding its documents.
#[derive(Debug, Clone, Copy)]
pub struct SeedFile<'a> {
    pub collection: Collection,
    pub path: &'a Path,
}

/// Seed collections from JSON files.
///
/// Files are read and checked before connecting, so a malformed file never
/// leaves a half-seeded database.
///
/// # Errors
///
/// Returns an error if no file was given, a file cannot be read or parsed,
/// or a database operation fails.
pub async fn run(files: &[SeedFile<'_>], truncate: bool) -> Result<(), Box<dyn std::error::Error>> {
    if files.is_empty() {
        return Err("nothing to seed: pass --customers, --orders and/or --products".into());
    }

    let mut loaded = Vec::with_capacity(files.len());
    for file in files {
        info!(collection = %file.collection, path = %file.path.display(), "Loading documents");
        let documents = read_documents(file.path).await?;
        let odd = nonconforming(file.collection, &documents);
        if odd > 0 {
            warn!(
                collection = %file.collection,
                nonconforming = odd,
                total = documents.len(),
                "Some documents do not match the expected shape"
            );
        }
        loaded.push((file.collection, documents));
    }

    let pool = super::connect().await?;

    for (collection, documents) in &loaded {
        let repo = CollectionRepository::new(&pool, *collection);
        if truncate {
            repo.truncate().await?;
            info!(collection = %collection, "Truncated collection");
        }
        let inserted = repo.insert_many(documents).await?;
        let total = repo.count().await?;
        info!(collection = %collection, inserted, total, "Seeded collection");
    }

    info!("Seeding complete!");
    Ok(())
}

/// Count documents that do not decode as the collection's document type.
#[must_use]
pub fn nonconforming(collection: Collection, documents: &[Value]) -> usize {
    match collection {
        Collection::Customers => count_undecodable::<Customer>(documents),
        Collection::Orders => count_undecodable::<Order>(documents),
        Collection::Products => count_undecodable::<Product>(documents),
    }
}

fn count_undecodable<T: DeserializeOwned>(documents: &[Value]) -> usize {
    documents
        .iter()
        .filter(|doc| T::deserialize(*doc).is_err())
        .count()
}
