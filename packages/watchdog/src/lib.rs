// Execution Watchdog & Recovery Controller
//
// This crate tracks long-running batch classification jobs, detects staleness
// via heartbeats, and drives safe recovery (stuck marking, cancellation,
// archiving, idempotent resumption).

pub mod config;
pub mod error;
pub mod models;
pub mod watchdog;

pub use config::*;
pub use error::WatchdogError;
