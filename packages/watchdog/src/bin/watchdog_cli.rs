//! Operator CLI for batch execution recovery.
//!
//! Outputs JSON for scripting against.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use watchdog_core::config::Config;
use watchdog_core::models::DocumentResult;
use watchdog_core::watchdog::{ExecutionDetail, ExecutionSummary, Watchdog};
use watchdog_core::WatchdogError;

#[derive(Parser)]
#[command(name = "watchdog_cli")]
#[command(about = "Inspect and recover batch classification executions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full diagnostic snapshot of one execution
    Status { id: Uuid },

    /// Error documents for an execution, most recent first
    Errors { id: Uuid },

    /// List unarchived Running/Stuck executions
    InFlight,

    /// Cancel a Running or Stuck execution
    Cancel { id: Uuid },

    /// Archive a finished execution (cancels first if Stuck)
    Archive { id: Uuid },

    /// Resume a Stuck execution, spending one retry attempt
    Resume { id: Uuid },
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<ExecutionDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<DocumentResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_flight: Option<Vec<ExecutionSummary>>,
}

impl Response {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
            detail: None,
            errors: None,
            in_flight: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            detail: None,
            errors: None,
            in_flight: None,
        }
    }
}

fn output(resp: Response) {
    println!("{}", serde_json::to_string_pretty(&resp).unwrap());
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let watchdog = build_watchdog().await?;

    let result = match cli.command {
        Commands::Status { id } => watchdog.get_status(id).await.map(|detail| Response {
            detail: Some(detail),
            ..Response::ok()
        }),
        Commands::Errors { id } => watchdog.list_errors(id).await.map(|errors| Response {
            errors: Some(errors),
            ..Response::ok()
        }),
        Commands::InFlight => watchdog.list_in_flight().await.map(|in_flight| Response {
            in_flight: Some(in_flight),
            ..Response::ok()
        }),
        Commands::Cancel { id } => watchdog.cancel(id).await.map(|execution| Response {
            message: Some(format!("execution {} cancelled", execution.id)),
            ..Response::ok()
        }),
        Commands::Archive { id } => watchdog.archive(id).await.map(|execution| Response {
            message: Some(format!("execution {} archived", execution.id)),
            ..Response::ok()
        }),
        Commands::Resume { id } => watchdog.resume(id).await.map(|execution| Response {
            message: Some(format!(
                "execution {} resumed (attempt {}/{})",
                execution.id, execution.retry_count, execution.max_retries
            )),
            ..Response::ok()
        }),
    };

    match result {
        Ok(resp) => output(resp),
        Err(e @ WatchdogError::Database(_)) => return Err(e.into()),
        // Expected states (not found, illegal transition, exhausted retries)
        // are reported, not crashed on.
        Err(e) => output(Response::error(e.to_string())),
    }

    Ok(())
}

async fn build_watchdog() -> Result<Watchdog> {
    let config = Config::from_env()?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    Ok(Watchdog::new(pool, config.watchdog))
}
