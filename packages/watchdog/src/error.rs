//! Typed errors for watchdog operations.
//!
//! The detector never surfaces these out of a tick; recovery and heartbeat
//! operations return them to the caller, who decides whether to retry.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ExecutionStatus;

#[derive(Debug, Error)]
pub enum WatchdogError {
    /// Unknown execution or document id.
    #[error("execution {0} not found")]
    NotFound(Uuid),

    /// The requested operation is illegal for the execution's current status.
    #[error("cannot {operation} execution {id} while it is {status:?}")]
    InvalidTransition {
        id: Uuid,
        operation: &'static str,
        status: ExecutionStatus,
    },

    /// Resume attempted past the allowed retry budget.
    #[error("execution {id} has used all {max_retries} retry attempts")]
    RetryLimitExceeded { id: Uuid, max_retries: i32 },

    /// A concurrent writer changed the row between read and conditional
    /// write. Transient; the caller may re-read and retry.
    #[error("execution {0} was modified concurrently")]
    StorageConflict(Uuid),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;
