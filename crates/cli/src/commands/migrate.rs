//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! rq-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ANALYTICS_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and create the `analytics`
//! schema with one JSONB document table per collection.

use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the analytics database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails,
/// or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running analytics migrations...");
    apply(&pool).await?;

    tracing::info!("Analytics migrations complete!");
    Ok(())
}

async fn apply(pool: &sqlx::PgPool) -> Result<(), MigrationError> {
    sqlx::migrate!("../api/migrations").run(pool).await?;
    Ok(())
}
