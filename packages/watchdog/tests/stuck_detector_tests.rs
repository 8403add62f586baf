//! Integration tests for the stuck detector scan.

mod common;

use common::*;
use test_context::test_context;
use watchdog_core::models::{DocumentStatus, ExecutionStatus};
use watchdog_core::watchdog::StuckDetector;

#[test_context(TestHarness)]
#[tokio::test]
async fn missed_heartbeat_marks_execution_stuck(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 2000).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 10).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;

    let execution = reload(&ctx.db_pool, execution.id).await;
    assert_eq!(execution.status, ExecutionStatus::Stuck);
    let reason = execution.error_message.expect("stuck execution has a reason");
    assert!(reason.contains("heartbeat"), "reason was: {reason}");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn recent_heartbeat_leaves_execution_running(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 100).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 1).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    let newly_stuck = detector.scan().await;

    assert!(!newly_stuck.iter().any(|s| s.id == execution.id));
    let execution = reload(&ctx.db_pool, execution.id).await;
    assert_eq!(execution.status, ExecutionStatus::Running);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn execution_without_any_heartbeat_falls_back_to_started_at(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 50).await;
    backdate_start_without_heartbeat(&ctx.db_pool, execution.id, 8).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;

    let execution = reload(&ctx.db_pool, execution.id).await;
    assert_eq!(execution.status, ExecutionStatus::Stuck);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn processing_documents_under_stuck_execution_become_error(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 3).await;
    let docs = seed_documents(&ctx.db_pool, execution.id, 3).await;
    force_document_state(&ctx.db_pool, docs[0].id, DocumentStatus::Processing, 1).await;
    force_document_state(&ctx.db_pool, docs[1].id, DocumentStatus::Completed, 1).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 10).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;

    let processing = reload_document(&ctx.db_pool, docs[0].id).await;
    assert_eq!(processing.status, DocumentStatus::Error);
    assert_eq!(processing.attempts, 2, "attempts incremented by exactly 1");
    assert!(processing.last_error_at.is_some());
    let message = processing.error_message.expect("swept document has a message");
    assert!(message.contains("watchdog"), "message was: {message}");

    // The detector only ever moves Processing to Error.
    let completed = reload_document(&ctx.db_pool, docs[1].id).await;
    assert_eq!(completed.status, DocumentStatus::Completed);
    let pending = reload_document(&ctx.db_pool, docs[2].id).await;
    assert_eq!(pending.status, DocumentStatus::Pending);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn wedged_item_marks_live_execution_stuck(ctx: &TestHarness) {
    // Heartbeat is fresh, but one item sat in Processing past the item
    // timeout: a worker alive overall but wedged on one document.
    let execution = running_execution(&ctx.db_pool, 5).await;
    let docs = seed_documents(&ctx.db_pool, execution.id, 1).await;
    force_document_state(&ctx.db_pool, docs[0].id, DocumentStatus::Processing, 0).await;
    backdate_document(&ctx.db_pool, docs[0].id, 3).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 1).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;

    let execution = reload(&ctx.db_pool, execution.id).await;
    assert_eq!(execution.status, ExecutionStatus::Stuck);
    let reason = execution.error_message.expect("stuck execution has a reason");
    assert!(reason.contains("stuck in processing"), "reason was: {reason}");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn scan_is_idempotent_for_already_stuck_executions(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 2).await;
    let docs = seed_documents(&ctx.db_pool, execution.id, 1).await;
    force_document_state(&ctx.db_pool, docs[0].id, DocumentStatus::Processing, 0).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 10).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;
    let after_first = reload_document(&ctx.db_pool, docs[0].id).await;

    let newly_stuck = detector.scan().await;

    assert!(!newly_stuck.iter().any(|s| s.id == execution.id));
    let after_second = reload_document(&ctx.db_pool, docs[0].id).await;
    assert_eq!(
        after_first.attempts, after_second.attempts,
        "attempts must not be double-incremented"
    );
    assert_eq!(reload(&ctx.db_pool, execution.id).await.status, ExecutionStatus::Stuck);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn completed_execution_is_never_marked_stuck(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 10).await;
    backdate_heartbeat(&ctx.db_pool, execution.id, 30).await;
    force_status(&ctx.db_pool, execution.id, ExecutionStatus::Completed).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    let newly_stuck = detector.scan().await;

    assert!(!newly_stuck.iter().any(|s| s.id == execution.id));
    assert_eq!(
        reload(&ctx.db_pool, execution.id).await.status,
        ExecutionStatus::Completed
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn processed_count_never_exceeds_total(ctx: &TestHarness) {
    let execution = running_execution(&ctx.db_pool, 2000).await;
    watchdog_core::models::Execution::record_progress(execution.id, 80, 75, 5, &ctx.db_pool)
        .await
        .unwrap();
    backdate_heartbeat(&ctx.db_pool, execution.id, 10).await;

    let detector = StuckDetector::new(ctx.db_pool.clone(), ctx.watchdog_config());
    detector.scan().await;

    let execution = reload(&ctx.db_pool, execution.id).await;
    assert_eq!(execution.items_processed, 80);
    assert!(execution.items_processed <= execution.total_items);
}
