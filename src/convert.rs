//! Multi-batch conversion driver.
//!
//! Every subdirectory of the data folder is one recorded batch. Batches are
//! converted one after the other; inside a batch the windows are produced
//! sequentially and each window's candidates are fanned out to the worker
//! pool. A batch that fails is recorded and the run moves on to the next.

use crate::audit::{create_shared_log, SharedAuditLog};
use crate::config::{Config, ConfigError};
use crate::core::dispatch::{DispatchSummary, Dispatcher};
use crate::core::roles::RoleAssigner;
use crate::core::windowing::SceneWindows;
use crate::track::store::{StoreError, TrackStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Effective configuration written next to each batch's samples.
pub const CONFIG_FILE_NAME: &str = "conversion_config.json";

/// Run statistics written into the data folder.
pub const AUDIT_FILE_NAME: &str = "conversion_log.json";

/// Errors that end the conversion of one batch, or of the whole run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot read data folder {path}: {source}")]
    DataFolder {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot create output folder {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    WriteConfig { path: PathBuf, source: ConfigError },
}

/// Outcome of one converted batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub batch: String,
    pub output_dir: PathBuf,
    pub windows: usize,
    pub summary: DispatchSummary,
    /// Ticks of the trailing partial window
    pub dropped_ticks: usize,
    /// Conversion stopped before the end of the batch
    pub interrupted: bool,
}

/// A batch whose conversion failed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub batch: String,
    pub reason: String,
}

/// Result of converting a whole data folder.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub run_id: Uuid,
    pub seed: u64,
    pub batches: Vec<BatchReport>,
    pub failures: Vec<BatchFailure>,
    pub interrupted: bool,
}

impl ConversionReport {
    /// Outcome counts summed over all converted batches.
    pub fn totals(&self) -> DispatchSummary {
        let mut total = DispatchSummary::default();
        for batch in &self.batches {
            total.merge(&batch.summary);
        }
        total
    }

    pub fn windows(&self) -> usize {
        self.batches.iter().map(|b| b.windows).sum()
    }
}

/// Converts recorded batches into role-assigned sample files.
pub struct Converter {
    config: Config,
    dispatcher: Dispatcher,
    seed: u64,
    stop: Option<Arc<AtomicBool>>,
    audit: SharedAuditLog,
}

impl Converter {
    /// Create a converter; a config without a seed gets a random one.
    pub fn new(config: Config) -> Result<Self, ConvertError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);

        Ok(Self {
            dispatcher: Dispatcher::new(config.max_parallel_workers),
            seed,
            stop: None,
            audit: create_shared_log(),
            config,
        })
    }

    /// Stop after the current window once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Convert every batch directory inside `data_folder`.
    pub fn convert(&self, data_folder: &Path) -> Result<ConversionReport, ConvertError> {
        let batch_dirs = list_batch_dirs(data_folder, &self.config.layout.output_dir)?;
        info!(
            data_folder = %data_folder.display(),
            batches = batch_dirs.len(),
            seed = self.seed,
            workers = self.dispatcher.max_workers(),
            "starting conversion"
        );

        let mut report = ConversionReport {
            run_id: self.audit.run_id(),
            seed: self.seed,
            batches: Vec::new(),
            failures: Vec::new(),
            interrupted: false,
        };

        for batch_dir in batch_dirs {
            if self.stop_requested() {
                report.interrupted = true;
                break;
            }

            match self.convert_batch(&batch_dir) {
                Ok(batch) => {
                    self.audit.record_batch_converted();
                    let interrupted = batch.interrupted;
                    report.batches.push(batch);
                    if interrupted {
                        report.interrupted = true;
                        break;
                    }
                }
                Err(e) => {
                    error!(batch = %batch_dir.display(), "batch failed: {e}");
                    self.audit.record_batch_failed();
                    report.failures.push(BatchFailure {
                        batch: batch_name(&batch_dir),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.interrupted {
            warn!("conversion interrupted");
        }

        let audit_path = data_folder.join(AUDIT_FILE_NAME);
        if let Err(e) = self.audit.save(&audit_path) {
            warn!(path = %audit_path.display(), "failed to save conversion log: {e}");
        }

        Ok(report)
    }

    /// Convert one batch directory.
    pub fn convert_batch(&self, batch_dir: &Path) -> Result<BatchReport, ConvertError> {
        let batch = batch_name(batch_dir);
        let store = TrackStore::load(batch_dir, &self.config.layout)?;

        let output_dir = batch_dir.join(&self.config.layout.output_dir);
        std::fs::create_dir_all(&output_dir).map_err(|source| ConvertError::CreateOutput {
            path: output_dir.clone(),
            source,
        })?;
        let config_path = output_dir.join(CONFIG_FILE_NAME);
        self.config
            .save_to(&config_path)
            .map_err(|source| ConvertError::WriteConfig {
                path: config_path,
                source,
            })?;

        let assigner = RoleAssigner::new(batch.as_str(), &output_dir, self.seed, &self.config);
        let mut report = BatchReport {
            batch,
            output_dir,
            ..BatchReport::default()
        };

        let mut windows = SceneWindows::new(
            store.ticks(),
            self.config.ticks_per_scene(),
            self.config.excluded_object_types.clone(),
        );
        for window in windows.by_ref() {
            let outcomes = self.dispatcher.dispatch_window(&assigner, &window);
            let summary = DispatchSummary::from_outcomes(&outcomes);
            self.audit.record_window(&summary);
            report.windows += 1;
            report.summary.merge(&summary);

            if self.stop_requested() {
                report.interrupted = true;
                break;
            }
        }
        if !report.interrupted {
            report.dropped_ticks = windows.dropped_ticks();
            self.audit.record_dropped_ticks(report.dropped_ticks as u64);
        }

        info!(
            batch = %report.batch,
            windows = report.windows,
            written = report.summary.written,
            skipped = report.summary.skipped(),
            failed = report.summary.failed,
            "converted batch"
        );
        Ok(report)
    }
}

/// Batch directories directly inside `data_folder`, sorted by path.
///
/// A directory named like the sample output folder is not a batch.
pub fn list_batch_dirs(data_folder: &Path, output_dir: &str) -> Result<Vec<PathBuf>, ConvertError> {
    let entries = std::fs::read_dir(data_folder).map_err(|source| ConvertError::DataFolder {
        path: data_folder.to_path_buf(),
        source,
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.file_name().map(|n| n != output_dir).unwrap_or(false))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn batch_name(batch_dir: &Path) -> String {
    batch_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| batch_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scene-sampler-{tag}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Two cars side by side for `ticks` ticks at 10 Hz.
    fn write_pair_batch(dir: &Path, ticks: usize) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("dynamic_property.csv"),
            "id,type,width,length\n1,car,2.0,4.5\n2,car,2.0,4.5\n",
        )
        .unwrap();

        let mut states = String::from("timestamp,id,status,center_x,center_y,heading\n");
        for i in 0..ticks {
            let ts = i as f64 * 0.1;
            for (id, x) in [(1, 0.0), (2, 10.0)] {
                states.push_str(&format!(
                    "{ts:.1},{id},\"{{\"\"velocity\"\": 3.0}}\",{x},0.0,0.0\n"
                ));
            }
        }
        std::fs::write(dir.join("dynamic_state.csv"), states).unwrap();
    }

    fn config() -> Config {
        Config {
            seed: Some(7),
            max_parallel_workers: 2,
            ..Config::default()
        }
    }

    #[test]
    fn test_batch_dirs_sorted_and_output_skipped() {
        let root = temp_dir("dirs");
        for name in ["b_2", "a_1", "dynamic_by_ts"] {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
        std::fs::write(root.join("notes.txt"), "x").unwrap();

        let dirs = list_batch_dirs(&root, "dynamic_by_ts").unwrap();
        let names: Vec<String> = dirs.iter().map(|d| batch_name(d)).collect();
        assert_eq!(names, vec!["a_1", "b_2"]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_data_folder_is_fatal() {
        let converter = Converter::new(config()).unwrap();
        let missing = std::env::temp_dir().join(format!("scene-sampler-none-{}", Uuid::new_v4()));
        assert!(matches!(
            converter.convert(&missing),
            Err(ConvertError::DataFolder { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            sampling_frequency: 0,
            ..Config::default()
        };
        assert!(matches!(
            Converter::new(config),
            Err(ConvertError::Config(_))
        ));
    }

    #[test]
    fn test_convert_batch_counts_windows_and_tail() {
        let root = temp_dir("batch");
        let batch_dir = root.join("batch_a");
        write_pair_batch(&batch_dir, 120);

        let converter = Converter::new(config()).unwrap();
        let report = converter.convert_batch(&batch_dir).unwrap();

        // Flushes happen at ticks 50 and 100; the last 20 ticks are dropped.
        assert_eq!(report.windows, 2);
        assert_eq!(report.dropped_ticks, 20);
        assert_eq!(report.summary.written, 4);
        assert!(report.output_dir.join(CONFIG_FILE_NAME).exists());

        let written = crate::stats::list_sample_files(&report.output_dir).unwrap();
        assert_eq!(written.len(), 4);
        let stats = converter.audit().stats();
        assert_eq!(stats.windows_completed, 2);
        assert_eq!(stats.samples_written, 4);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_stop_flag_ends_after_current_window() {
        let root = temp_dir("stop");
        write_pair_batch(&root.join("batch_a"), 150);
        write_pair_batch(&root.join("batch_b"), 150);

        let flag = Arc::new(AtomicBool::new(true));
        let converter = Converter::new(config()).unwrap().with_stop_flag(flag);
        let report = converter.convert(&root).unwrap();

        assert!(report.interrupted);
        assert!(report.batches.is_empty());

        std::fs::remove_dir_all(&root).unwrap();
    }
}
