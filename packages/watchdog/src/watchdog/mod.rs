//! Watchdog core: liveness tracking and recovery for batch executions.
//!
//! - [`HeartbeatRecorder`] - worker-facing liveness write path
//! - [`StuckDetector`] - per-tick staleness scan
//! - [`RecoveryController`] - operator cancel/archive/resume
//! - [`Supervisor`] - periodic, non-overlapping detector driver
//! - [`StatusReporter`] - read-only diagnostics
//! - [`Watchdog`] - facade wiring the above to one pool + config
//!
//! # Architecture
//!
//! ```text
//! worker ──► Execution::start / record_progress / complete
//!     │
//!     └──► HeartbeatRecorder.record()
//!
//! Supervisor (every CHECK_INTERVAL)
//!     └──► StuckDetector.scan()
//!             ├─► Running + stale ──► Stuck (+ reason)
//!             └─► Processing items ──► Error (attempts + 1)
//!
//! operator ──► RecoveryController.cancel / archive / resume
//!          └─► StatusReporter.detail / list_errors / list_in_flight
//! ```

mod detector;
mod heartbeat;
mod recovery;
mod reporter;
mod supervisor;

pub use detector::{StuckDetector, StuckExecution};
pub use heartbeat::HeartbeatRecorder;
pub use recovery::RecoveryController;
pub use reporter::{ExecutionDetail, ExecutionSummary, StatusReporter};
pub use supervisor::Supervisor;

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::WatchdogConfig;
use crate::error::WatchdogResult;
use crate::models::{DocumentResult, Execution};

/// Control surface over one database pool and one configuration.
///
/// Any transport (CLI, RPC, HTTP) can sit on top of this; the binaries in
/// this crate expose the operator subset over the command line.
#[derive(Clone)]
pub struct Watchdog {
    pool: PgPool,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(pool: PgPool, config: WatchdogConfig) -> Self {
        Self { pool, config }
    }

    /// Create an execution for a new batch job, immediately Running.
    pub async fn start_execution(
        &self,
        context_tag: &str,
        total_items: i32,
    ) -> WatchdogResult<Execution> {
        Ok(Execution::start(context_tag, total_items, self.config.max_retries, &self.pool).await?)
    }

    pub async fn heartbeat(
        &self,
        execution_id: Uuid,
        last_item_marker: Option<&str>,
    ) -> WatchdogResult<()> {
        HeartbeatRecorder::new(self.pool.clone())
            .record(execution_id, last_item_marker)
            .await
    }

    pub async fn get_status(&self, execution_id: Uuid) -> WatchdogResult<ExecutionDetail> {
        StatusReporter::new(self.pool.clone()).detail(execution_id).await
    }

    pub async fn list_errors(&self, execution_id: Uuid) -> WatchdogResult<Vec<DocumentResult>> {
        StatusReporter::new(self.pool.clone()).list_errors(execution_id).await
    }

    pub async fn list_in_flight(&self) -> WatchdogResult<Vec<ExecutionSummary>> {
        StatusReporter::new(self.pool.clone()).list_in_flight().await
    }

    pub async fn cancel(&self, execution_id: Uuid) -> WatchdogResult<Execution> {
        RecoveryController::new(self.pool.clone()).cancel(execution_id).await
    }

    pub async fn archive(&self, execution_id: Uuid) -> WatchdogResult<Execution> {
        RecoveryController::new(self.pool.clone()).archive(execution_id).await
    }

    pub async fn resume(&self, execution_id: Uuid) -> WatchdogResult<Execution> {
        RecoveryController::new(self.pool.clone()).resume(execution_id).await
    }

    /// Build the supervision loop over this pool and config.
    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.pool.clone(), self.config.clone())
    }
}
