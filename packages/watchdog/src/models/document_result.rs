//! DocumentResult model: the processing record for one item within an
//! Execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
    Skipped,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct DocumentResult {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub execution_id: Uuid,
    pub item_code: String,
    #[builder(default)]
    pub status: DocumentStatus,
    #[builder(default = 0)]
    pub attempts: i32,
    #[builder(default, setter(strip_option))]
    pub last_error_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = r#"
    id, execution_id, item_code, status, attempts, last_error_at, error_message,
    created_at, updated_at
"#;

impl DocumentResult {
    /// Whether the worker may pick this item up again.
    pub fn eligible_for_reprocessing(&self, max_attempts: i32) -> bool {
        matches!(self.status, DocumentStatus::Pending | DocumentStatus::Error)
            && self.attempts < max_attempts
    }

    /// Seed Pending rows for a batch of items up front.
    pub async fn seed_pending(
        execution_id: Uuid,
        item_codes: &[String],
        pool: &PgPool,
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;
        for code in item_codes {
            let result = sqlx::query(
                r#"
                INSERT INTO document_results (id, execution_id, item_code, status)
                VALUES ($1, $2, $3, 'pending')
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(execution_id)
            .bind(code)
            .execute(pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_results WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_execution(
        execution_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS}
            FROM document_results
            WHERE execution_id = $1
            ORDER BY created_at ASC
            "#,
        ))
        .bind(execution_id)
        .fetch_all(pool)
        .await
    }

    /// Error rows for an execution, most recent error first.
    pub async fn find_errors(
        execution_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {DOCUMENT_COLUMNS}
            FROM document_results
            WHERE execution_id = $1 AND status = 'error'
            ORDER BY last_error_at DESC NULLS LAST
            "#,
        ))
        .bind(execution_id)
        .fetch_all(pool)
        .await
    }

    /// Worker transition: Pending/Error -> Processing, bounded by attempts.
    pub async fn mark_processing(
        id: Uuid,
        max_attempts: i32,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'error') AND attempts < $2
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Worker transition: Processing -> Completed.
    pub async fn mark_completed(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'completed', error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Worker transition: Processing -> Error.
    pub async fn mark_error(
        id: Uuid,
        error: &str,
        pool: &PgPool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'error',
                attempts = attempts + 1,
                last_error_at = NOW(),
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Worker transition: Processing -> Skipped.
    pub async fn mark_skipped(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'skipped', updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_errors(execution_id: Uuid, pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM document_results WHERE execution_id = $1 AND status = 'error'",
        )
        .bind(execution_id)
        .fetch_one(pool)
        .await
    }

    /// How many Processing rows under an execution have not been touched
    /// since `cutoff`. The detector treats these as wedged items.
    pub async fn count_stalled_processing(
        execution_id: Uuid,
        cutoff: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM document_results
            WHERE execution_id = $1 AND status = 'processing' AND updated_at < $2
            "#,
        )
        .bind(execution_id)
        .bind(cutoff)
        .fetch_one(pool)
        .await
    }

    /// Detector sweep: every Processing row under a stuck execution becomes
    /// Error with one more attempt burned. Only ever moves Processing ->
    /// Error, never the reverse, so it cannot clobber a worker's Completed
    /// write. Returns the number of rows swept.
    pub async fn fail_processing_for_execution(
        execution_id: Uuid,
        error: &str,
        pool: &PgPool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'error',
                attempts = attempts + 1,
                last_error_at = NOW(),
                error_message = $2,
                updated_at = NOW()
            WHERE execution_id = $1 AND status = 'processing'
            "#,
        )
        .bind(execution_id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Resume sweep: Error rows with attempts left go back to Pending so the
    /// worker can re-process them. Completed rows are never touched.
    pub async fn requeue_errors_for_execution(
        execution_id: Uuid,
        max_attempts: i32,
        pool: &PgPool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE document_results
            SET status = 'pending', updated_at = NOW()
            WHERE execution_id = $1 AND status = 'error' AND attempts < $2
            "#,
        )
        .bind(execution_id)
        .bind(max_attempts)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
