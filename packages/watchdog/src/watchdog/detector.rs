//! Stuck detector: scans Running executions for staleness and transitions
//! them (and their wedged items) to failure states.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::WatchdogConfig;
use crate::models::{DocumentResult, Execution};

/// One execution newly marked stuck during a scan.
#[derive(Debug, Clone)]
pub struct StuckExecution {
    pub id: Uuid,
    pub context_tag: String,
    pub reason: String,
    /// Processing documents swept to Error under this execution.
    pub swept_documents: u64,
}

pub struct StuckDetector {
    pool: PgPool,
    config: WatchdogConfig,
}

impl StuckDetector {
    pub fn new(pool: PgPool, config: WatchdogConfig) -> Self {
        Self { pool, config }
    }

    /// Run one scan over all Running executions.
    ///
    /// Never raises: storage errors are logged and the affected execution is
    /// skipped, so one bad row cannot abort the whole tick. Returns the
    /// executions newly marked stuck.
    pub async fn scan(&self) -> Vec<StuckExecution> {
        let executions = match Execution::find_running(&self.pool).await {
            Ok(executions) => executions,
            Err(e) => {
                error!(error = %e, "stuck detector failed to list running executions");
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut newly_stuck = Vec::new();

        for execution in executions {
            match self.check_execution(&execution, now).await {
                Ok(Some(stuck)) => newly_stuck.push(stuck),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        execution_id = %execution.id,
                        error = %e,
                        "stuck detector skipping execution after storage error"
                    );
                }
            }
        }

        if !newly_stuck.is_empty() {
            info!(count = newly_stuck.len(), "detector marked executions stuck");
        }

        newly_stuck
    }

    /// Apply the staleness rules to one Running execution.
    async fn check_execution(
        &self,
        execution: &Execution,
        now: DateTime<Utc>,
    ) -> Result<Option<StuckExecution>, sqlx::Error> {
        let reason = match self.staleness_reason(execution, now).await? {
            Some(reason) => reason,
            None => return Ok(None),
        };

        // Conditional write: only applied if the execution is still Running.
        // Losing the race (worker finished in between) makes this a no-op,
        // which is what keeps repeated scans idempotent.
        let transitioned = Execution::mark_stuck(execution.id, &reason, &self.pool).await?;
        if !transitioned {
            debug!(
                execution_id = %execution.id,
                "execution left running state before stuck write, skipping"
            );
            return Ok(None);
        }

        let swept = DocumentResult::fail_processing_for_execution(
            execution.id,
            &format!("marked as error by watchdog: {reason}"),
            &self.pool,
        )
        .await?;

        info!(
            execution_id = %execution.id,
            context_tag = %execution.context_tag,
            reason = %reason,
            swept_documents = swept,
            "execution marked stuck"
        );

        Ok(Some(StuckExecution {
            id: execution.id,
            context_tag: execution.context_tag.clone(),
            reason,
            swept_documents: swept,
        }))
    }

    /// Staleness rules, in order: missed heartbeat first, then wedged items.
    async fn staleness_reason(
        &self,
        execution: &Execution,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, sqlx::Error> {
        let heartbeat_timeout = Duration::seconds(self.config.heartbeat_timeout.as_secs() as i64);
        if execution.heartbeat_stale(now, heartbeat_timeout) {
            let last_seen = execution.last_heartbeat_at.unwrap_or(execution.started_at);
            return Ok(Some(heartbeat_reason((now - last_seen).num_minutes())));
        }

        // A worker can be alive overall but wedged on one item.
        let processing_timeout = Duration::seconds(self.config.processing_timeout.as_secs() as i64);
        let cutoff = now - processing_timeout;
        let wedged = DocumentResult::count_stalled_processing(execution.id, cutoff, &self.pool).await?;
        if wedged > 0 {
            return Ok(Some(wedged_reason(wedged)));
        }

        Ok(None)
    }
}

fn heartbeat_reason(minutes: i64) -> String {
    format!("no heartbeat for {minutes} minutes")
}

fn wedged_reason(count: i64) -> String {
    format!("{count} item(s) stuck in processing")
}
