//! Configuration for scene sampling.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::sample::SampleColumn;

/// Main configuration for conversion, balancing and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recorded ticks per second
    pub sampling_frequency: u32,

    /// Length of one scene window in seconds
    pub scene_duration_secs: u32,

    /// Offset of the reference tick used for neighbour filtering, in seconds
    pub reference_offset_secs: u32,

    /// Neighbour radius around the focal object (map units)
    pub radius_around_agent: f64,

    /// Object types removed from every tick before windowing
    pub excluded_object_types: Vec<String>,

    /// Upper bound on concurrently running candidate tasks
    pub max_parallel_workers: usize,

    /// Column order of emitted sample files
    pub column_order: Vec<SampleColumn>,

    /// Seed for AV selection and shuffling; drawn at random when absent
    pub seed: Option<u64>,

    /// File names inside a batch directory
    pub layout: BatchLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_frequency: 10,
            scene_duration_secs: 5,
            reference_offset_secs: 2,
            radius_around_agent: 50.0,
            excluded_object_types: vec!["traffic_light".to_string()],
            max_parallel_workers: 5,
            column_order: SampleColumn::CANONICAL.to_vec(),
            seed: None,
            layout: BatchLayout::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration as pretty JSON to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scene-sampler")
            .join("config.json")
    }

    /// Number of distinct timestamps in one scene window.
    pub fn ticks_per_scene(&self) -> usize {
        (self.sampling_frequency as usize) * (self.scene_duration_secs as usize)
    }

    /// Zero-based index of the reference tick within a focal object's rows.
    pub fn reference_tick(&self) -> usize {
        (self.sampling_frequency as usize) * (self.reference_offset_secs as usize)
    }

    /// Check that the configuration describes a usable pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_frequency == 0 {
            return Err(ConfigError::Invalid(
                "sampling_frequency must be positive".to_string(),
            ));
        }
        if self.scene_duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "scene_duration_secs must be positive".to_string(),
            ));
        }
        if self.ticks_per_scene() < 2 {
            return Err(ConfigError::Invalid(
                "a scene window needs at least 2 ticks".to_string(),
            ));
        }
        if self.reference_tick() >= self.ticks_per_scene() {
            return Err(ConfigError::Invalid(format!(
                "reference tick {} lies outside a {}-tick window",
                self.reference_tick(),
                self.ticks_per_scene()
            )));
        }
        if !(self.radius_around_agent.is_finite() && self.radius_around_agent > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "radius_around_agent must be a positive number, got {}",
                self.radius_around_agent
            )));
        }
        if self.max_parallel_workers == 0 {
            return Err(ConfigError::Invalid(
                "max_parallel_workers must be at least 1".to_string(),
            ));
        }

        let unique: HashSet<&SampleColumn> = self.column_order.iter().collect();
        if self.column_order.len() != SampleColumn::CANONICAL.len()
            || unique.len() != SampleColumn::CANONICAL.len()
        {
            return Err(ConfigError::Invalid(
                "column_order must list every sample column exactly once".to_string(),
            ));
        }

        Ok(())
    }
}

/// File names used inside one recorded batch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchLayout {
    /// Per-tick telemetry table
    pub state_file: String,
    /// Static per-object property table
    pub property_file: String,
    /// Directory (inside the batch) receiving sample files
    pub output_dir: String,
}

impl Default for BatchLayout {
    fn default() -> Self {
        Self {
            state_file: "dynamic_state.csv".to_string(),
            property_file: "dynamic_property.csv".to_string(),
            output_dir: "dynamic_by_ts".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
