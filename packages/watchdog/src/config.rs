use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Timing and retry options for the watchdog.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Job-level staleness threshold.
    pub heartbeat_timeout: Duration,
    /// Single-item staleness threshold. Must be shorter than the heartbeat
    /// timeout so a wedged item is noticed before the whole job is declared
    /// dead.
    pub processing_timeout: Duration,
    /// Detector cadence.
    pub check_interval: Duration,
    /// Default resume budget for new executions.
    pub max_retries: i32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(5 * 60),
            processing_timeout: Duration::from_secs(2 * 60),
            check_interval: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

impl WatchdogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.processing_timeout >= self.heartbeat_timeout {
            bail!(
                "PROCESSING_TIMEOUT_MINUTES must be shorter than HEARTBEAT_TIMEOUT_MINUTES \
                 ({:?} >= {:?})",
                self.processing_timeout,
                self.heartbeat_timeout
            );
        }
        if self.max_retries < 0 {
            bail!("MAX_RETRIES must not be negative");
        }
        Ok(())
    }

    pub fn heartbeat_timeout_minutes(&self) -> i64 {
        self.heartbeat_timeout.as_secs() as i64 / 60
    }

    pub fn processing_timeout_minutes(&self) -> i64 {
        self.processing_timeout.as_secs() as i64 / 60
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub watchdog: WatchdogConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let heartbeat_timeout_minutes: u64 = env::var("HEARTBEAT_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("HEARTBEAT_TIMEOUT_MINUTES must be a valid number")?;
        let processing_timeout_minutes: u64 = env::var("PROCESSING_TIMEOUT_MINUTES")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .context("PROCESSING_TIMEOUT_MINUTES must be a valid number")?;
        let check_interval_seconds: u64 = env::var("CHECK_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("CHECK_INTERVAL_SECONDS must be a valid number")?;
        let max_retries: i32 = env::var("MAX_RETRIES")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .context("MAX_RETRIES must be a valid number")?;

        let watchdog = WatchdogConfig {
            heartbeat_timeout: Duration::from_secs(heartbeat_timeout_minutes * 60),
            processing_timeout: Duration::from_secs(processing_timeout_minutes * 60),
            check_interval: Duration::from_secs(check_interval_seconds),
            max_retries,
        };
        watchdog.validate()?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            watchdog,
        })
    }
}
