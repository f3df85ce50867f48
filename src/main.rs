use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use safety_engine::config::Config;
use safety_engine::db::{IncidentsDb, StaticRoster, StaticSignals, TrustDb};
use safety_engine::events::TracingEventBus;
use safety_engine::services::{ContentHeuristics, TrustScoreLedger};

/// Maintenance worker: refreshes trust records whose incidents have aged
/// into the decay window. The decision pipeline itself is consumed as a
/// library by the serving layer.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    tracing::info!("Starting safety decision engine sweep...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        "Configuration loaded"
    );

    // Fail fast if the word list is missing or unreadable.
    ContentHeuristics::new(&config.profanity_words_path)?;
    tracing::info!(path = %config.profanity_words_path, "Content heuristics loaded");

    // Initialize database pool
    let pool = Arc::new(
        PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?,
    );
    tracing::info!("Database pool initialized");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&*pool)
        .await
        .map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            e
        })?;
    tracing::info!("Migrations completed successfully");

    let ledger = TrustScoreLedger::new(
        Arc::new(IncidentsDb::new(pool.clone())),
        Arc::new(TrustDb::new(pool.clone())),
        Arc::new(StaticSignals::new()),
        Arc::new(StaticRoster::new()),
        Arc::new(TracingEventBus),
        config.trust_write_retry_attempts,
    );

    let updated = ledger.decay_sweep().await?;
    tracing::info!(updated = %updated, "Trust decay sweep finished");

    Ok(())
}
