//! Fixtures for arranging executions and documents in specific states.
//!
//! Staleness scenarios are arranged by backdating timestamps with raw
//! updates rather than by sleeping through real timeouts.

use sqlx::PgPool;
use uuid::Uuid;
use watchdog_core::models::{DocumentResult, DocumentStatus, Execution, ExecutionStatus};

/// Start a Running execution with the default retry budget.
pub async fn running_execution(pool: &PgPool, total_items: i32) -> Execution {
    Execution::start("test-batch", total_items, 3, pool)
        .await
        .expect("failed to start execution")
}

/// Seed `count` Pending documents under an execution and return them.
pub async fn seed_documents(pool: &PgPool, execution_id: Uuid, count: usize) -> Vec<DocumentResult> {
    let codes: Vec<String> = (0..count).map(|i| format!("DOC-{i:04}")).collect();
    DocumentResult::seed_pending(execution_id, &codes, pool)
        .await
        .expect("failed to seed documents");
    DocumentResult::find_by_execution(execution_id, pool)
        .await
        .expect("failed to load documents")
}

/// Set the execution's heartbeat to `minutes` ago.
pub async fn backdate_heartbeat(pool: &PgPool, execution_id: Uuid, minutes: i64) {
    sqlx::query(
        "UPDATE executions SET last_heartbeat_at = NOW() - ($2 || ' minutes')::INTERVAL WHERE id = $1",
    )
    .bind(execution_id)
    .bind(minutes.to_string())
    .execute(pool)
    .await
    .expect("failed to backdate heartbeat");
}

/// Clear the heartbeat entirely and push `started_at` back `minutes`.
pub async fn backdate_start_without_heartbeat(pool: &PgPool, execution_id: Uuid, minutes: i64) {
    sqlx::query(
        r#"
        UPDATE executions
        SET last_heartbeat_at = NULL,
            started_at = NOW() - ($2 || ' minutes')::INTERVAL
        WHERE id = $1
        "#,
    )
    .bind(execution_id)
    .bind(minutes.to_string())
    .execute(pool)
    .await
    .expect("failed to backdate start");
}

/// Force an execution into an arbitrary status (test arrangement only).
pub async fn force_status(pool: &PgPool, execution_id: Uuid, status: ExecutionStatus) {
    sqlx::query("UPDATE executions SET status = $2 WHERE id = $1")
        .bind(execution_id)
        .bind(status)
        .execute(pool)
        .await
        .expect("failed to force status");
}

pub async fn set_retry_count(pool: &PgPool, execution_id: Uuid, retry_count: i32) {
    sqlx::query("UPDATE executions SET retry_count = $2 WHERE id = $1")
        .bind(execution_id)
        .bind(retry_count)
        .execute(pool)
        .await
        .expect("failed to set retry count");
}

/// Force a document into an arbitrary status with a given attempt count.
pub async fn force_document_state(
    pool: &PgPool,
    document_id: Uuid,
    status: DocumentStatus,
    attempts: i32,
) {
    sqlx::query(
        r#"
        UPDATE document_results
        SET status = $2,
            attempts = $3,
            last_error_at = CASE WHEN $2 = 'error'::document_status THEN NOW() ELSE last_error_at END
        WHERE id = $1
        "#,
    )
    .bind(document_id)
    .bind(status)
    .bind(attempts)
    .execute(pool)
    .await
    .expect("failed to force document state");
}

/// Push a document's `updated_at` back `minutes` (wedged-item arrangement).
pub async fn backdate_document(pool: &PgPool, document_id: Uuid, minutes: i64) {
    sqlx::query(
        "UPDATE document_results SET updated_at = NOW() - ($2 || ' minutes')::INTERVAL WHERE id = $1",
    )
    .bind(document_id)
    .bind(minutes.to_string())
    .execute(pool)
    .await
    .expect("failed to backdate document");
}

/// Reload an execution, panicking if it disappeared.
pub async fn reload(pool: &PgPool, execution_id: Uuid) -> Execution {
    Execution::find_by_id(execution_id, pool)
        .await
        .expect("failed to reload execution")
        .expect("execution disappeared")
}

/// Reload a document, panicking if it disappeared.
pub async fn reload_document(pool: &PgPool, document_id: Uuid) -> DocumentResult {
    DocumentResult::find_by_id(document_id, pool)
        .await
        .expect("failed to reload document")
        .expect("document disappeared")
}
