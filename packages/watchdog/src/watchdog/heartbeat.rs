//! Heartbeat write path used by the classification worker.

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{WatchdogError, WatchdogResult};
use crate::models::Execution;

/// Narrow write path the worker calls to report liveness and the
/// last-processed item marker.
///
/// Callers must heartbeat more often than the staleness threshold; a worker
/// that falls behind will be marked stuck by the detector.
#[derive(Clone)]
pub struct HeartbeatRecorder {
    pool: PgPool,
}

impl HeartbeatRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a heartbeat for a Running execution.
    ///
    /// A heartbeat against an execution that exists but is no longer Running
    /// is an Ok no-op: the worker learns it lost the job when it next reads
    /// execution status.
    pub async fn record(
        &self,
        execution_id: Uuid,
        last_item_marker: Option<&str>,
    ) -> WatchdogResult<()> {
        let updated = Execution::record_heartbeat(execution_id, last_item_marker, &self.pool).await?;

        if !updated {
            match Execution::find_by_id(execution_id, &self.pool).await? {
                None => return Err(WatchdogError::NotFound(execution_id)),
                Some(execution) => {
                    debug!(
                        execution_id = %execution_id,
                        status = ?execution.status,
                        "heartbeat ignored for non-running execution"
                    );
                }
            }
        }

        Ok(())
    }
}
