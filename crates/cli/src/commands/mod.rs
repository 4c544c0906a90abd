//! Subcommand implementations.

pub mod migrate;
pub mod report;
pub mod seed;

use secrecy::SecretString;

/// Connection pool size for one-shot CLI commands.
const CLI_MAX_CONNECTIONS: u32 = 2;

/// Read the analytics database URL, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if neither variable is set.
pub fn database_url() -> Result<SecretString, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    std::env::var("ANALYTICS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "ANALYTICS_DATABASE_URL not set".into())
}

/// Connect to the analytics database.
///
/// # Errors
///
/// Returns an error if the URL is missing or the connection fails.
pub async fn connect() -> Result<sqlx::PgPool, Box<dyn std::error::Error>> {
    let database_url = database_url()?;
    let pool = rq_analytics_api::db::create_pool(&database_url, CLI_MAX_CONNECTIONS).await?;
    tracing::info!("Connected to database");
    Ok(pool)
}
