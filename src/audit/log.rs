//! Run counters for sample generation.

use crate::core::dispatch::DispatchSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters for the current conversion run.
#[derive(Debug)]
pub struct AuditLog {
    /// Identifier of this run
    run_id: Uuid,
    /// Run start time
    run_start: DateTime<Utc>,
    batches_converted: AtomicU64,
    batches_failed: AtomicU64,
    windows_completed: AtomicU64,
    samples_written: AtomicU64,
    skipped_out_of_range: AtomicU64,
    skipped_insufficient_neighbors: AtomicU64,
    skipped_non_finite: AtomicU64,
    failed_tasks: AtomicU64,
    /// Ticks discarded as trailing partial windows
    dropped_ticks: AtomicU64,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_start: Utc::now(),
            batches_converted: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            samples_written: AtomicU64::new(0),
            skipped_out_of_range: AtomicU64::new(0),
            skipped_insufficient_neighbors: AtomicU64::new(0),
            skipped_non_finite: AtomicU64::new(0),
            failed_tasks: AtomicU64::new(0),
            dropped_ticks: AtomicU64::new(0),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record a batch that was converted to the end.
    pub fn record_batch_converted(&self) {
        self.batches_converted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch that failed fatally.
    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed window and the outcomes of its candidates.
    pub fn record_window(&self, summary: &DispatchSummary) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
        self.samples_written
            .fetch_add(summary.written as u64, Ordering::Relaxed);
        self.skipped_out_of_range
            .fetch_add(summary.skipped_out_of_range as u64, Ordering::Relaxed);
        self.skipped_insufficient_neighbors
            .fetch_add(summary.skipped_insufficient_neighbors as u64, Ordering::Relaxed);
        self.skipped_non_finite
            .fetch_add(summary.skipped_non_finite as u64, Ordering::Relaxed);
        self.failed_tasks
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
    }

    /// Record ticks lost to a trailing partial window.
    pub fn record_dropped_ticks(&self, count: u64) {
        self.dropped_ticks.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            run_id: self.run_id,
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
            batches_converted: self.batches_converted.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            samples_written: self.samples_written.load(Ordering::Relaxed),
            skipped_out_of_range: self.skipped_out_of_range.load(Ordering::Relaxed),
            skipped_insufficient_neighbors: self
                .skipped_insufficient_neighbors
                .load(Ordering::Relaxed),
            skipped_non_finite: self.skipped_non_finite.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            dropped_ticks: self.dropped_ticks.load(Ordering::Relaxed),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run {}:\n\
             - Batches converted: {}\n\
             - Batches failed: {}\n\
             - Windows completed: {}\n\
             - Samples written: {}\n\
             - Skipped (reference tick out of range): {}\n\
             - Skipped (insufficient neighbors): {}\n\
             - Skipped (non-finite position): {}\n\
             - Failed tasks: {}\n\
             - Ticks dropped in partial windows: {}\n\
             - Duration: {} seconds",
            stats.run_id,
            stats.batches_converted,
            stats.batches_failed,
            stats.windows_completed,
            stats.samples_written,
            stats.skipped_out_of_range,
            stats.skipped_insufficient_neighbors,
            stats.skipped_non_finite,
            stats.failed_tasks,
            stats.dropped_ticks,
            stats.run_duration_secs
        )
    }

    /// Persist the current statistics as JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedRun {
            stats: self.stats(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

        std::fs::write(path, json)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub run_id: Uuid,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
    pub batches_converted: u64,
    pub batches_failed: u64,
    pub windows_completed: u64,
    pub samples_written: u64,
    pub skipped_out_of_range: u64,
    pub skipped_insufficient_neighbors: u64,
    pub skipped_non_finite: u64,
    pub failed_tasks: u64,
    pub dropped_ticks: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRun {
    #[serde(flatten)]
    stats: AuditStats,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();

        log.record_window(&DispatchSummary {
            written: 3,
            skipped_out_of_range: 1,
            skipped_insufficient_neighbors: 2,
            skipped_non_finite: 0,
            failed: 1,
        });
        log.record_window(&DispatchSummary {
            written: 2,
            ..DispatchSummary::default()
        });
        log.record_batch_converted();
        log.record_dropped_ticks(7);

        let stats = log.stats();
        assert_eq!(stats.windows_completed, 2);
        assert_eq!(stats.samples_written, 5);
        assert_eq!(stats.skipped_out_of_range, 1);
        assert_eq!(stats.skipped_insufficient_neighbors, 2);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.batches_converted, 1);
        assert_eq!(stats.dropped_ticks, 7);
    }

    #[test]
    fn test_summary_format() {
        let log = AuditLog::new();
        let summary = log.summary();

        assert!(summary.contains("Samples written"));
        assert!(summary.contains("insufficient neighbors"));
        assert!(summary.contains(&log.run_id().to_string()));
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir()
            .join(format!("scene-sampler-audit-{}", Uuid::new_v4()))
            .join("conversion_log.json");
        let log = AuditLog::new();
        log.record_batch_failed();
        log.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["batches_failed"], 1);
        assert!(value["last_updated"].is_string());

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
