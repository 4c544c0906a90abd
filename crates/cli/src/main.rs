//! RQ Analytics CLI - migrations, seeding and offline reports.
//!
//! # Usage
//!
//! ```bash
//! # Create the analytics schema and document tables
//! rq-cli migrate
//!
//! # Load exported documents
//! rq-cli seed --customers customers.json --orders orders.json --truncate
//!
//! # Run a metric against the database, or against fixture files
//! rq-cli report sales-growth --interval quarterly
//! rq-cli report geographical-distribution --fixture ./exports
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Load JSON document exports into the store
//! - `report` - Compute one metric and print its rows as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rq_analytics_api::analytics::Metric;
use rq_analytics_core::{CoercionPolicy, Collection};

mod commands;

use commands::seed::SeedFile;

#[derive(Parser)]
#[command(name = "rq-cli")]
#[command(author, version, about = "RQ Analytics CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load JSON document exports into the analytics database
    Seed {
        /// JSON array of customer documents
        #[arg(long)]
        customers: Option<PathBuf>,

        /// JSON array of order documents
        #[arg(long)]
        orders: Option<PathBuf>,

        /// JSON array of product documents
        #[arg(long)]
        products: Option<PathBuf>,

        /// Empty each seeded collection first
        #[arg(long)]
        truncate: bool,
    },
    /// Compute one metric and print its rows as JSON
    Report {
        /// Metric name (e.g., sales, sales-growth, repeat-customers)
        metric: Metric,

        /// Bucketing interval (daily, monthly, quarterly, yearly)
        #[arg(short, long)]
        interval: Option<String>,

        /// Read customers.json / orders.json / products.json from this
        /// directory instead of the database
        #[arg(short, long)]
        fixture: Option<PathBuf>,

        /// Coercion policy (lenient or strict)
        #[arg(long, default_value = "lenient")]
        policy: CoercionPolicy,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed {
            customers,
            orders,
            products,
            truncate,
        } => {
            let files: Vec<SeedFile<'_>> = [
                (Collection::Customers, customers.as_deref()),
                (Collection::Orders, orders.as_deref()),
                (Collection::Products, products.as_deref()),
            ]
            .into_iter()
            .filter_map(|(collection, path)| path.map(|path| SeedFile { collection, path }))
            .collect();
            commands::seed::run(&files, truncate).await?;
        }
        Commands::Report {
            metric,
            interval,
            fixture,
            policy,
        } => {
            commands::report::run(metric, interval.as_deref(), fixture.as_deref(), policy).await?;
        }
    }
    Ok(())
}
