//! Scene Sampler - agent-centric trajectory samples from recorded traffic scenes.
//!
//! This library turns per-tick telemetry of a recorded driving batch into
//! fixed-length scene samples, one per focal object, with every nearby
//! object labelled by its role relative to that focal object. Samples can
//! then be classified by maneuver, balanced across maneuver labels and
//! summarised.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Scene Sampler                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │ Track Store │──▶│  Windowing  │──▶│ Dispatcher  │            │
//! │  │ (csv join)  │   │ (5s scenes) │   │ (N workers) │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │                                             │                    │
//! │                                             ▼                    │
//! │  ┌─────────────┐                     ┌─────────────┐            │
//! │  │  Audit Log  │◀────────────────────│    Roles    │──▶ *.csv   │
//! │  │             │                     │ AGENT/AV/.. │            │
//! │  └─────────────┘                     └─────────────┘            │
//! │                                                                  │
//! │  *.csv ──▶ Maneuver classifier ──▶ Equalizer / Stats report      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scene_sampler::{Config, Converter};
//! use std::path::Path;
//!
//! let converter = Converter::new(Config::default()).expect("valid config");
//! let report = converter.convert(Path::new("data")).expect("readable data folder");
//! println!("{} samples written", report.totals().written);
//! ```

pub mod audit;
pub mod config;
pub mod convert;
pub mod core;
pub mod stats;
pub mod track;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use config::{BatchLayout, Config, ConfigError};
pub use convert::{BatchReport, ConversionReport, ConvertError, Converter};
pub use core::{Dispatcher, Role, SampleColumn, SceneWindow, WindowAccumulator};
pub use stats::{CorpusStats, Equalizer, Maneuver};
pub use track::{Status, TrackPoint, TrackStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_shape() {
        let config = Config::default();
        assert_eq!(config.ticks_per_scene(), 50);
        assert_eq!(config.reference_tick(), 20);
        assert!(!VERSION.is_empty());
    }
}
