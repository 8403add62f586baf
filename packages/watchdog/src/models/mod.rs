//! Persistent entities: one batch job and its per-document records.

mod document_result;
mod execution;

pub use document_result::{DocumentResult, DocumentStatus};
pub use execution::{Execution, ExecutionStatus};
