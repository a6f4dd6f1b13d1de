//! Class balancing of a sample corpus.
//!
//! Every file is bucketed by the maneuver label of its AGENT trajectory.
//! Buckets are shuffled independently and cut to the size of the smallest
//! bucket, so the output holds the same number of files for every label.

use crate::core::dispatch::Dispatcher;
use crate::stats::corpus::{ClassifiedCorpus, SampleFailure};
use crate::stats::maneuver::Maneuver;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors that abort a balancing run.
#[derive(Debug, Error)]
pub enum EqualizeError {
    #[error("cannot read corpus {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create output folder {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Result of a balancing run.
#[derive(Debug, Clone, Serialize)]
pub struct EqualizeReport {
    /// Bucket sizes before truncation
    pub bucket_sizes: BTreeMap<Maneuver, usize>,
    /// Files kept per label
    pub per_label: usize,
    /// Files written to the output folder
    pub copied: Vec<PathBuf>,
    /// Files left out because they could not be classified
    pub failures: Vec<SampleFailure>,
}

/// Label buckets of a corpus.
#[derive(Debug, Clone)]
pub struct Equalizer {
    buckets: BTreeMap<Maneuver, Vec<PathBuf>>,
    failures: Vec<SampleFailure>,
}

impl Equalizer {
    /// Classify all samples in `folder` and bucket them by label.
    pub fn scan(folder: &Path, dispatcher: &Dispatcher) -> Result<Self, EqualizeError> {
        let corpus =
            ClassifiedCorpus::scan(folder, dispatcher).map_err(|source| EqualizeError::Scan {
                path: folder.to_path_buf(),
                source,
            })?;
        Ok(Self::from_corpus(corpus))
    }

    pub fn from_corpus(corpus: ClassifiedCorpus) -> Self {
        let mut buckets: BTreeMap<Maneuver, Vec<PathBuf>> =
            Maneuver::ALL.iter().map(|&m| (m, Vec::new())).collect();
        for (path, summary) in corpus.entries {
            buckets.entry(summary.label).or_default().push(path);
        }
        Self {
            buckets,
            failures: corpus.failures,
        }
    }

    pub fn bucket_sizes(&self) -> BTreeMap<Maneuver, usize> {
        self.buckets.iter().map(|(&m, files)| (m, files.len())).collect()
    }

    pub fn failures(&self) -> &[SampleFailure] {
        &self.failures
    }

    /// Size every bucket is cut down to.
    pub fn min_bucket_size(&self) -> usize {
        self.buckets.values().map(Vec::len).min().unwrap_or(0)
    }

    /// Shuffle each bucket and keep a prefix of the smallest bucket's size.
    pub fn select(&self, seed: u64) -> BTreeMap<Maneuver, Vec<PathBuf>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let keep = self.min_bucket_size();

        self.buckets
            .iter()
            .map(|(&label, files)| {
                let mut files = files.clone();
                files.shuffle(&mut rng);
                files.truncate(keep);
                (label, files)
            })
            .collect()
    }

    /// Copy the balanced selection into `save_folder`, keeping file names.
    pub fn run(&self, save_folder: &Path, seed: u64) -> Result<EqualizeReport, EqualizeError> {
        std::fs::create_dir_all(save_folder).map_err(|source| EqualizeError::CreateOutput {
            path: save_folder.to_path_buf(),
            source,
        })?;

        let selection = self.select(seed);
        let mut copied = Vec::new();
        for from in selection.values().flatten() {
            let Some(name) = from.file_name() else {
                continue;
            };
            let to = save_folder.join(name);
            std::fs::copy(from, &to).map_err(|source| EqualizeError::Copy {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
            copied.push(to);
        }

        let report = EqualizeReport {
            bucket_sizes: self.bucket_sizes(),
            per_label: self.min_bucket_size(),
            copied,
            failures: self.failures.clone(),
        };
        info!(
            output = %save_folder.display(),
            per_label = report.per_label,
            copied = report.copied.len(),
            "equalized corpus"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::maneuver::TrajectorySummary;

    fn corpus(counts: [(Maneuver, usize); 4]) -> ClassifiedCorpus {
        let mut entries = Vec::new();
        for (label, n) in counts {
            for i in 0..n {
                entries.push((
                    PathBuf::from(format!("{label}_{i:03}.csv")),
                    TrajectorySummary {
                        label,
                        average_speed: 1.0,
                    },
                ));
            }
        }
        ClassifiedCorpus {
            entries,
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_buckets_cut_to_minimum() {
        let equalizer = Equalizer::from_corpus(corpus([
            (Maneuver::Left, 7),
            (Maneuver::Right, 3),
            (Maneuver::Stay, 12),
            (Maneuver::Straight, 5),
        ]));
        assert_eq!(equalizer.min_bucket_size(), 3);

        let selection = equalizer.select(1);
        assert_eq!(selection.len(), 4);
        for (label, files) in &selection {
            assert_eq!(files.len(), 3);
            assert!(files
                .iter()
                .all(|f| f.to_string_lossy().starts_with(label.as_str())));
        }
    }

    #[test]
    fn test_empty_label_empties_output() {
        let equalizer = Equalizer::from_corpus(corpus([
            (Maneuver::Left, 4),
            (Maneuver::Right, 0),
            (Maneuver::Stay, 2),
            (Maneuver::Straight, 9),
        ]));
        assert_eq!(equalizer.min_bucket_size(), 0);
        assert!(equalizer.select(3).values().all(Vec::is_empty));
    }

    #[test]
    fn test_selection_reproducible_per_seed() {
        let equalizer = Equalizer::from_corpus(corpus([
            (Maneuver::Left, 20),
            (Maneuver::Right, 10),
            (Maneuver::Stay, 30),
            (Maneuver::Straight, 40),
        ]));
        assert_eq!(equalizer.select(42), equalizer.select(42));

        let a = equalizer.select(1);
        let differs = (2..10).any(|seed| equalizer.select(seed) != a);
        assert!(differs);
    }
}
