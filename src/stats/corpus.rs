//! Classification of a whole directory of sample files.

use crate::core::dispatch::Dispatcher;
use crate::stats::maneuver::{classify_sample, TrajectorySummary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A sample file that could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Per-file classification results of one corpus directory.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedCorpus {
    /// Successfully classified files, in path order
    pub entries: Vec<(PathBuf, TrajectorySummary)>,
    /// Files excluded because classification failed
    pub failures: Vec<SampleFailure>,
}

impl ClassifiedCorpus {
    /// Classify every `*.csv` file directly inside `folder`.
    pub fn scan(folder: &Path, dispatcher: &Dispatcher) -> std::io::Result<Self> {
        let files = list_sample_files(folder)?;
        let results = dispatcher.run(files.clone(), |path| classify_sample(&path));

        let mut corpus = Self::default();
        for (path, result) in files.into_iter().zip(results) {
            match result {
                Ok(Ok(summary)) => corpus.entries.push((path, summary)),
                Ok(Err(e)) => {
                    warn!("skipping unclassifiable sample: {e}");
                    corpus.failures.push(SampleFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(panic) => {
                    warn!(path = %path.display(), "{panic}");
                    corpus.failures.push(SampleFailure {
                        path,
                        reason: panic.to_string(),
                    });
                }
            }
        }

        info!(
            folder = %folder.display(),
            classified = corpus.entries.len(),
            failed = corpus.failures.len(),
            "classified corpus"
        );
        Ok(corpus)
    }
}

/// Sample files directly inside `folder`, sorted by path.
pub fn list_sample_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "csv").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}
