//! Warehouse ledger audit
//!
//! Connects to the inventory database, applies pending migrations when
//! configured to, and verifies every item's stock figures against its
//! history. Exits non-zero when any item disagrees.

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use warehouse::{store::PgStore, telemetry, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    telemetry::init(&config.logging);

    tracing::info!("Starting warehouse ledger audit");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    let store = PgStore::new(db_pool);

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        store.migrate().await?;
        tracing::info!("Migrations completed");
    }

    let state = AppState::new(Arc::new(store));
    let discrepancies = state.audit().run().await?;

    if discrepancies.is_empty() {
        tracing::info!("Stock ledger is consistent");
        return Ok(());
    }

    for d in &discrepancies {
        println!("{}", serde_json::to_string(d)?);
    }
    anyhow::bail!("{} item(s) with inconsistent stock", discrepancies.len())
}
