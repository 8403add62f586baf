//! Watchdog daemon: runs the supervision loop until shutdown.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;
use watchdog_core::config::Config;
use watchdog_core::watchdog::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let supervisor = Supervisor::new(pool, config.watchdog);

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(supervisor.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // The in-flight detector tick finishes before the loop exits.
    shutdown.cancel();
    handle.await.context("supervision loop panicked")?;

    Ok(())
}
