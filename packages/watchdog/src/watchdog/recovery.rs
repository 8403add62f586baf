//! Recovery controller: operator-facing cancel, archive and resume.
//!
//! Every operation reads the current status, validates the transition table,
//! then writes conditionally on the status it read. A lost race surfaces as
//! `StorageConflict` rather than clobbering a concurrent change.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{WatchdogError, WatchdogResult};
use crate::models::{DocumentResult, Execution, ExecutionStatus};

#[derive(Clone)]
pub struct RecoveryController {
    pool: PgPool,
}

impl RecoveryController {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get(&self, id: Uuid) -> WatchdogResult<Execution> {
        Execution::find_by_id(id, &self.pool)
            .await?
            .ok_or(WatchdogError::NotFound(id))
    }

    /// Cancel an in-flight execution. Legal only from Running or Stuck.
    ///
    /// Cancellation is cooperative: this flips the stored status, and a
    /// worker mid-item keeps running until it next checks execution status.
    pub async fn cancel(&self, id: Uuid) -> WatchdogResult<Execution> {
        let execution = self.get(id).await?;

        if !execution.status.can_cancel() {
            return Err(WatchdogError::InvalidTransition {
                id,
                operation: "cancel",
                status: execution.status,
            });
        }

        if !Execution::cancel_if(id, execution.status, &self.pool).await? {
            return Err(WatchdogError::StorageConflict(id));
        }

        info!(execution_id = %id, from = ?execution.status, "execution cancelled");
        self.get(id).await
    }

    /// Archive a finished execution. Legal only from a terminal status; a
    /// Stuck execution is cancelled first. Never un-archives.
    pub async fn archive(&self, id: Uuid) -> WatchdogResult<Execution> {
        let mut execution = self.get(id).await?;

        if execution.archived {
            return Err(WatchdogError::InvalidTransition {
                id,
                operation: "archive",
                status: execution.status,
            });
        }

        if execution.status == ExecutionStatus::Stuck {
            execution = self.cancel(id).await?;
        }

        if !execution.status.can_archive() {
            return Err(WatchdogError::InvalidTransition {
                id,
                operation: "archive",
                status: execution.status,
            });
        }

        if !Execution::archive_if(id, execution.status, &self.pool).await? {
            return Err(WatchdogError::StorageConflict(id));
        }

        info!(execution_id = %id, status = ?execution.status, "execution archived");
        self.get(id).await
    }

    /// Resume a Stuck execution, spending one retry attempt.
    ///
    /// Error documents with attempts left go back to Pending so the worker
    /// can re-process them; Completed documents are untouched, which is what
    /// makes resumption idempotent.
    pub async fn resume(&self, id: Uuid) -> WatchdogResult<Execution> {
        let execution = self.get(id).await?;

        if execution.status != ExecutionStatus::Stuck {
            return Err(WatchdogError::InvalidTransition {
                id,
                operation: "resume",
                status: execution.status,
            });
        }

        if execution.retry_count >= execution.max_retries {
            return Err(WatchdogError::RetryLimitExceeded {
                id,
                max_retries: execution.max_retries,
            });
        }

        if !Execution::resume_if_stuck(id, &self.pool).await? {
            return Err(WatchdogError::StorageConflict(id));
        }

        let requeued =
            DocumentResult::requeue_errors_for_execution(id, execution.max_retries, &self.pool)
                .await?;

        info!(
            execution_id = %id,
            attempt = execution.retry_count + 1,
            max_retries = execution.max_retries,
            requeued_documents = requeued,
            "execution resumed"
        );
        self.get(id).await
    }
}
