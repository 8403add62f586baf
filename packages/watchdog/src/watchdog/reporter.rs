//! Read-only status aggregation for diagnostics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{WatchdogError, WatchdogResult};
use crate::models::{DocumentResult, Execution, ExecutionStatus};

/// Full diagnostic snapshot of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDetail {
    pub id: Uuid,
    pub context_tag: String,
    pub status: ExecutionStatus,
    pub total_items: i32,
    pub items_processed: i32,
    pub items_succeeded: i32,
    pub items_failed: i32,
    pub progress_percent: f64,
    pub is_stuck_now: bool,
    pub can_resume: bool,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Why the execution is Stuck, Failed, or non-resumable.
    pub reason: Option<String>,
    pub error_documents: i64,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_processed_item: Option<String>,
    pub archived: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Compact listing entry for in-flight views.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub context_tag: String,
    pub status: ExecutionStatus,
    pub total_items: i32,
    pub items_processed: i32,
    pub progress_percent: f64,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
}

impl From<&Execution> for ExecutionSummary {
    fn from(execution: &Execution) -> Self {
        Self {
            id: execution.id,
            context_tag: execution.context_tag.clone(),
            status: execution.status,
            total_items: execution.total_items,
            items_processed: execution.items_processed,
            progress_percent: execution.progress_percent(),
            last_heartbeat_at: execution.last_heartbeat_at,
            started_at: execution.started_at,
        }
    }
}

#[derive(Clone)]
pub struct StatusReporter {
    pool: PgPool,
}

impl StatusReporter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Status, counts, progress and liveness flags for one execution.
    /// Always succeeds for a known id, whatever state the job is in.
    pub async fn detail(&self, id: Uuid) -> WatchdogResult<ExecutionDetail> {
        let execution = Execution::find_by_id(id, &self.pool)
            .await?
            .ok_or(WatchdogError::NotFound(id))?;
        let error_documents = DocumentResult::count_errors(id, &self.pool).await?;

        let reason = if !execution.can_resume() && execution.status == ExecutionStatus::Stuck {
            Some(format!(
                "retry limit reached ({}/{}): {}",
                execution.retry_count,
                execution.max_retries,
                execution.error_message.as_deref().unwrap_or("stuck"),
            ))
        } else {
            execution.error_message.clone()
        };

        Ok(ExecutionDetail {
            id: execution.id,
            context_tag: execution.context_tag.clone(),
            status: execution.status,
            total_items: execution.total_items,
            items_processed: execution.items_processed,
            items_succeeded: execution.items_succeeded,
            items_failed: execution.items_failed,
            progress_percent: execution.progress_percent(),
            is_stuck_now: execution.status == ExecutionStatus::Stuck,
            can_resume: execution.can_resume(),
            retry_count: execution.retry_count,
            max_retries: execution.max_retries,
            reason,
            error_documents,
            last_heartbeat_at: execution.last_heartbeat_at,
            last_processed_item: execution.last_processed_item.clone(),
            archived: execution.archived,
            started_at: execution.started_at,
            finished_at: execution.finished_at,
        })
    }

    /// Error documents for an execution, most recent error first.
    pub async fn list_errors(&self, id: Uuid) -> WatchdogResult<Vec<DocumentResult>> {
        if Execution::find_by_id(id, &self.pool).await?.is_none() {
            return Err(WatchdogError::NotFound(id));
        }
        Ok(DocumentResult::find_errors(id, &self.pool).await?)
    }

    /// Summaries of unarchived Running/Stuck executions.
    pub async fn list_in_flight(&self) -> WatchdogResult<Vec<ExecutionSummary>> {
        let executions = Execution::find_in_flight(&self.pool).await?;
        Ok(executions.iter().map(ExecutionSummary::from).collect())
    }
}
