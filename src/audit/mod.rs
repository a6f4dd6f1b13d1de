//! Audit trail of conversion runs.
//!
//! Tracks what a run produced and skipped so that sample yield can be
//! inspected after the fact.

pub mod log;

// Re-export commonly used types
pub use log::{create_shared_log, AuditLog, AuditStats, SharedAuditLog};
