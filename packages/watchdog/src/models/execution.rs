//! Execution model: one batch classification job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "execution_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Stuck,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal statuses are closed except for the orthogonal archived flag.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Cancel is legal only while the job is in flight.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Running | Self::Stuck)
    }

    /// Archive is legal only once the job has ended.
    pub fn can_archive(&self) -> bool {
        self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stuck => "stuck",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// Execution Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Execution {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    /// Which route/feature started this job.
    pub context_tag: String,

    // Counts
    #[builder(default = 0)]
    pub total_items: i32,
    #[builder(default = 0)]
    pub items_processed: i32,
    #[builder(default = 0)]
    pub items_succeeded: i32,
    #[builder(default = 0)]
    pub items_failed: i32,

    // State
    #[builder(default)]
    pub status: ExecutionStatus,

    // Liveness
    #[builder(default, setter(strip_option))]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_processed_item: Option<String>,

    // Retry bookkeeping
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default = 3)]
    pub max_retries: i32,

    // Diagnostics
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    // Soft delete, orthogonal to status
    #[builder(default = false)]
    pub archived: bool,

    // Lifecycle timestamps
    #[builder(default = Utc::now())]
    pub started_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub finished_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

const EXECUTION_COLUMNS: &str = r#"
    id, context_tag, total_items, items_processed, items_succeeded, items_failed,
    status, last_heartbeat_at, last_processed_item, retry_count, max_retries,
    error_message, archived, started_at, finished_at, created_at, updated_at
"#;

impl Execution {
    /// Whether the job is currently stale by heartbeat.
    ///
    /// Falls back to `started_at` when no heartbeat was ever recorded, so a
    /// worker that dies before its first heartbeat is still caught.
    pub fn heartbeat_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let last_seen = self.last_heartbeat_at.unwrap_or(self.started_at);
        now - last_seen > timeout
    }

    /// Whether resume would be accepted right now.
    pub fn can_resume(&self) -> bool {
        self.status == ExecutionStatus::Stuck && self.retry_count < self.max_retries
    }

    /// Progress of the job in percent (0.0 when nothing was seeded).
    pub fn progress_percent(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            self.items_processed as f64 / self.total_items as f64 * 100.0
        }
    }

    /// Create and persist a new execution, immediately Running.
    ///
    /// Jobs have no queueing phase here; the worker creates the row at the
    /// moment it starts processing.
    pub async fn start(
        context_tag: &str,
        total_items: i32,
        max_retries: i32,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO executions (id, context_tag, total_items, status, max_retries, started_at)
            VALUES ($1, $2, $3, 'running', $4, NOW())
            RETURNING {EXECUTION_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(context_tag)
        .bind(total_items)
        .bind(max_retries)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All executions the detector must consider this tick.
    pub async fn find_running(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM executions
            WHERE status = 'running'
            ORDER BY started_at ASC
            "#,
        ))
        .fetch_all(pool)
        .await
    }

    /// Unarchived executions still in flight (Running or Stuck).
    pub async fn find_in_flight(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM executions
            WHERE status IN ('running', 'stuck') AND archived = FALSE
            ORDER BY started_at ASC
            "#,
        ))
        .fetch_all(pool)
        .await
    }

    /// Record a heartbeat, only while the execution is Running.
    ///
    /// `NOW()` under the `status = 'running'` guard keeps heartbeat
    /// timestamps monotonically non-decreasing. Returns whether a row was
    /// updated.
    pub async fn record_heartbeat(
        id: Uuid,
        last_item_marker: Option<&str>,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET last_heartbeat_at = NOW(),
                last_processed_item = COALESCE($2, last_processed_item),
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(last_item_marker)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Worker progress update, clamped so `items_processed` never exceeds
    /// `total_items`.
    pub async fn record_progress(
        id: Uuid,
        processed_delta: i32,
        succeeded_delta: i32,
        failed_delta: i32,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET items_processed = LEAST(items_processed + $2, total_items),
                items_succeeded = items_succeeded + $3,
                items_failed = items_failed + $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(processed_delta)
        .bind(succeeded_delta)
        .bind(failed_delta)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal worker transition: Running -> Completed.
    pub async fn complete(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'completed', finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal worker transition: Running -> Failed.
    pub async fn fail(id: Uuid, error: &str, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'failed', error_message = $2, finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Detector transition: Running -> Stuck.
    ///
    /// Guarded on `status = 'running'` so a worker that completed between
    /// the detector's read and this write wins the race. Returns whether the
    /// transition was applied.
    pub async fn mark_stuck(id: Uuid, reason: &str, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'stuck', error_message = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditional cancel: applied only if the row still holds `expected`.
    pub async fn cancel_if(
        id: Uuid,
        expected: ExecutionStatus,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'cancelled', finished_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditional archive: only from the expected terminal status, and
    /// never twice.
    pub async fn archive_if(
        id: Uuid,
        expected: ExecutionStatus,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET archived = TRUE, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND archived = FALSE
            "#,
        )
        .bind(id)
        .bind(expected)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditional resume: Stuck -> Running, bounded by the retry budget.
    ///
    /// Refreshes the heartbeat so the execution gets a full timeout window
    /// before the detector may mark it stuck again.
    pub async fn resume_if_stuck(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = 'running',
                retry_count = retry_count + 1,
                error_message = NULL,
                last_heartbeat_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'stuck' AND retry_count < max_retries
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
