//! Corpus statistics: label frequencies and the average-speed distribution.
//!
//! The output is plain data meant to be handed to a plotting tool.

use crate::core::dispatch::Dispatcher;
use crate::stats::corpus::{ClassifiedCorpus, SampleFailure};
use crate::stats::maneuver::Maneuver;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Max, Median, Min, Statistics};
use std::collections::BTreeMap;
use std::path::Path;

/// Default number of speed histogram bins.
pub const DEFAULT_SPEED_BINS: usize = 100;

/// Summary of the per-file average speeds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl SpeedSummary {
    pub fn from_speeds(speeds: &[f64]) -> Option<Self> {
        if speeds.is_empty() {
            return None;
        }
        let std_dev = if speeds.len() > 1 {
            speeds.iter().std_dev()
        } else {
            0.0
        };

        let data = Data::new(speeds.to_vec());

        Some(Self {
            count: speeds.len(),
            mean: speeds.iter().mean(),
            std_dev,
            min: data.min(),
            max: data.max(),
            median: data.median(),
        })
    }
}

/// Fixed-width histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range.
    ///
    /// The last bin is closed on the right. A degenerate range is widened
    /// by 0.5 on either side.
    pub fn new(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Self {
                edges: Vec::new(),
                counts: Vec::new(),
            };
        }

        let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for v in finite {
            let index = (((v - lo) / width) as usize).min(bins - 1);
            counts[index] += 1;
        }

        Self { edges, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Aggregated statistics of one corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Frequency of every label; labels without files are listed with zero
    pub labels: BTreeMap<Maneuver, usize>,
    /// Average speed of each classified file, in path order
    pub speeds: Vec<f64>,
    pub speed_summary: Option<SpeedSummary>,
    pub speed_histogram: Histogram,
    pub failures: Vec<SampleFailure>,
}

impl CorpusStats {
    /// Classify every sample in `folder` and aggregate the results.
    pub fn collect(folder: &Path, dispatcher: &Dispatcher, bins: usize) -> std::io::Result<Self> {
        let corpus = ClassifiedCorpus::scan(folder, dispatcher)?;
        Ok(Self::from_corpus(&corpus, bins))
    }

    pub fn from_corpus(corpus: &ClassifiedCorpus, bins: usize) -> Self {
        let mut labels: BTreeMap<Maneuver, usize> =
            Maneuver::ALL.iter().map(|&m| (m, 0)).collect();
        let mut speeds = Vec::with_capacity(corpus.entries.len());

        for (_, summary) in &corpus.entries {
            *labels.entry(summary.label).or_default() += 1;
            speeds.push(summary.average_speed);
        }

        Self {
            labels,
            speed_summary: SpeedSummary::from_speeds(&speeds),
            speed_histogram: Histogram::new(&speeds, bins),
            speeds,
            failures: corpus.failures.clone(),
        }
    }

    pub fn classified(&self) -> usize {
        self.labels.values().sum()
    }

    /// Text rendering for terminals.
    pub fn summary(&self) -> String {
        let mut out = String::from("Maneuver labels:\n");
        for (label, count) in &self.labels {
            out.push_str(&format!("  {label:<9} {count}\n"));
        }
        match &self.speed_summary {
            Some(s) => out.push_str(&format!(
                "Average speed over {} files:\n  mean {:.3}, std {:.3}, median {:.3}, min {:.3}, max {:.3}\n",
                s.count, s.mean, s.std_dev, s.median, s.min, s.max
            )),
            None => out.push_str("No classified files.\n"),
        }
        if !self.failures.is_empty() {
            out.push_str(&format!("Unclassifiable files: {}\n", self.failures.len()));
        }
        out
    }
}
