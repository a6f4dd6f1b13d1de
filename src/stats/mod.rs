//! Post-hoc passes over persisted samples.
//!
//! This module contains:
//! - Maneuver classification of AGENT trajectories
//! - Corpus scanning shared by the passes below
//! - The equalizer producing a class-balanced subset
//! - Label and speed statistics for external plotting

pub mod corpus;
pub mod equalizer;
pub mod maneuver;
pub mod report;

pub use corpus::{list_sample_files, ClassifiedCorpus, SampleFailure};
pub use equalizer::{EqualizeError, EqualizeReport, Equalizer};
pub use maneuver::{classify, classify_sample, ClassifyError, Maneuver, TrajectorySummary};
pub use report::{CorpusStats, Histogram, SpeedSummary, DEFAULT_SPEED_BINS};
