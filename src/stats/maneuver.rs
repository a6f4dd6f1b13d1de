//! Maneuver classification of a single trajectory.
//!
//! The label is a coarse turn integral over the whole span: headings are
//! shifted by π, successive differences are summed, and the sign of the sum
//! decides between left and right. A near-zero sum falls back to the average
//! speed to separate standing from driving straight.

use crate::core::sample::{read_sample, SampleRecord};
use crate::track::types::{Status, StatusError};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Turn sums with magnitude at or below this are treated as zero.
pub const HEADING_NOISE_THRESHOLD: f64 = 1e-2;

/// Average speeds below this count as standing still.
pub const STAY_SPEED_THRESHOLD: f64 = 1.0;

/// Discrete maneuver label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maneuver {
    Left,
    Right,
    Stay,
    Straight,
}

impl Maneuver {
    pub const ALL: [Maneuver; 4] = [
        Maneuver::Left,
        Maneuver::Right,
        Maneuver::Stay,
        Maneuver::Straight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Maneuver::Left => "left",
            Maneuver::Right => "right",
            Maneuver::Stay => "stay",
            Maneuver::Straight => "straight",
        }
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Net heading change over the sequence, with noise clamped to zero.
pub fn heading_turn(headings: &[f64]) -> f64 {
    let shifted: Vec<f64> = headings.iter().map(|h| h + std::f64::consts::PI).collect();
    let sum: f64 = shifted.windows(2).map(|pair| pair[1] - pair[0]).sum();

    if sum.abs() > HEADING_NOISE_THRESHOLD {
        sum
    } else {
        0.0
    }
}

/// Classify a heading sequence given its precomputed average speed.
pub fn classify(headings: &[f64], average_speed: f64) -> Maneuver {
    let turn = heading_turn(headings);

    if turn > 0.0 {
        Maneuver::Left
    } else if turn < 0.0 {
        Maneuver::Right
    } else if average_speed.abs() < STAY_SPEED_THRESHOLD {
        Maneuver::Stay
    } else {
        Maneuver::Straight
    }
}

/// Errors raised while classifying one sample file.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("{path} has no AGENT rows")]
    NoAgentRows { path: PathBuf },
    #[error("{path} row {row}: {source}")]
    MalformedStatus {
        path: PathBuf,
        row: usize,
        source: StatusError,
    },
    #[error("{path} row {row}: AGENT status carries no velocity")]
    NotVelocity { path: PathBuf, row: usize },
}

/// Label and average speed of one sample's AGENT trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub label: Maneuver,
    pub average_speed: f64,
}

/// Classify the AGENT trajectory of already-read sample rows.
pub fn summarize_agent(
    path: &Path,
    records: &[SampleRecord],
) -> Result<TrajectorySummary, ClassifyError> {
    let mut headings = Vec::new();
    let mut speeds = Vec::new();

    // Row numbers count data rows of the file, not only AGENT rows.
    for (row, record) in records.iter().enumerate().filter(|(_, r)| r.is_agent()) {
        let status =
            Status::parse(&record.status).map_err(|source| ClassifyError::MalformedStatus {
                path: path.to_path_buf(),
                row,
                source,
            })?;
        let speed = status.velocity().ok_or_else(|| ClassifyError::NotVelocity {
            path: path.to_path_buf(),
            row,
        })?;
        headings.push(record.heading);
        speeds.push(speed);
    }

    if speeds.is_empty() {
        return Err(ClassifyError::NoAgentRows {
            path: path.to_path_buf(),
        });
    }

    let average_speed = speeds.iter().mean();
    Ok(TrajectorySummary {
        label: classify(&headings, average_speed),
        average_speed,
    })
}

/// Read a sample file and classify its AGENT trajectory.
pub fn classify_sample(path: &Path) -> Result<TrajectorySummary, ClassifyError> {
    let records = read_sample(path).map_err(|source| ClassifyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    summarize_agent(path, &records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str, heading: f64, status: &str) -> SampleRecord {
        SampleRecord {
            timestamp: 0.0,
            id: 1,
            object_type: role.to_string(),
            center_x: 0.0,
            center_y: 0.0,
            heading,
            status: status.to_string(),
        }
    }

    #[test]
    fn test_flat_headings_use_speed() {
        assert_eq!(classify(&[0.0, 0.0, 0.0, 0.0], 0.5), Maneuver::Stay);
        assert_eq!(classify(&[0.0, 0.0, 0.0, 0.0], 3.0), Maneuver::Straight);
        assert_eq!(classify(&[0.0, 0.0, 0.0, 0.0], -0.99), Maneuver::Stay);
        assert_eq!(classify(&[0.0, 0.0, 0.0, 0.0], -1.0), Maneuver::Straight);
    }

    #[test]
    fn test_turn_sign() {
        assert_eq!(classify(&[0.0, 0.1, 0.3, 0.6], 5.0), Maneuver::Left);
        assert_eq!(classify(&[0.6, 0.3, 0.1, 0.0], 5.0), Maneuver::Right);
    }

    #[test]
    fn test_reversal_flips_label() {
        let forward = [0.2, 0.25, 0.4, 0.9, 1.1];
        let mut backward = forward;
        backward.reverse();
        assert_eq!(classify(&forward, 2.0), Maneuver::Left);
        assert_eq!(classify(&backward, 2.0), Maneuver::Right);
    }

    #[test]
    fn test_noise_never_turns() {
        for delta in [0.0, 0.001, -0.005, 0.0099, -0.0099] {
            let headings = [1.0, 1.0 + delta / 2.0, 1.0 + delta];
            let label = classify(&headings, 4.0);
            assert!(
                matches!(label, Maneuver::Stay | Maneuver::Straight),
                "delta {delta} gave {label}"
            );
        }
    }

    #[test]
    fn test_degenerate_sequences() {
        assert_eq!(heading_turn(&[]), 0.0);
        assert_eq!(heading_turn(&[2.0]), 0.0);
        assert_eq!(classify(&[], 0.0), Maneuver::Stay);
    }

    #[test]
    fn test_deterministic() {
        let headings = [0.1, -0.2, 0.4, 0.35];
        let first = classify(&headings, 1.5);
        for _ in 0..10 {
            assert_eq!(classify(&headings, 1.5), first);
        }
    }

    #[test]
    fn test_summarize_agent_rows_only() {
        let records = vec![
            record("AGENT", 0.0, r#"{"velocity": 2.0}"#),
            record("AV", 3.0, r#"{"velocity": 50.0}"#),
            record("AGENT", 0.5, r#"{"velocity": 4.0}"#),
        ];
        let summary = summarize_agent(Path::new("x.csv"), &records).unwrap();
        assert_eq!(summary.label, Maneuver::Left);
        assert!((summary.average_speed - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_status_is_labelled_error() {
        let records = vec![
            record("AGENT", 0.0, r#"{"velocity": 2.0}"#),
            record("OTHERS", 0.0, "garbage"),
            record("AGENT", 0.0, "{velocity: 2.0"),
        ];
        let err = summarize_agent(Path::new("bad.csv"), &records).unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedStatus { row: 2, .. }));
        assert!(err.to_string().starts_with("bad.csv row 2"));
    }

    #[test]
    fn test_signal_status_rejected() {
        let records = vec![record("AGENT", 0.0, r#"{"light_state": "RED"}"#)];
        assert!(matches!(
            summarize_agent(Path::new("x.csv"), &records),
            Err(ClassifyError::NotVelocity { row: 0, .. })
        ));
    }

    #[test]
    fn test_missing_agent() {
        let records = vec![record("AV", 0.0, r#"{"velocity": 2.0}"#)];
        assert!(matches!(
            summarize_agent(Path::new("x.csv"), &records),
            Err(ClassifyError::NoAgentRows { .. })
        ));
    }
}
