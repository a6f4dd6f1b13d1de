//! Telemetry record types for recorded traffic scenes.
//!
//! A batch is described by two tables: the per-tick state of every object and
//! the static properties of each object. Both are immutable once recorded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier of one recorded object.
pub type ObjectId = u32;

/// Signal state reported by a traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightState {
    Red,
    Yellow,
    Green,
    Off,
    Unknown,
}

/// Per-tick status payload.
///
/// Serialized as a single-key JSON object, e.g. `{"velocity":3.2}` or
/// `{"light_state":"RED"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Scalar speed of a moving object
    Velocity(f64),
    /// Discrete state of a static-but-stateful object
    LightState(LightState),
}

impl Status {
    /// Parse a status cell.
    pub fn parse(raw: &str) -> Result<Self, StatusError> {
        serde_json::from_str(raw.trim()).map_err(|e| StatusError {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Scalar speed, if this is a moving object's status.
    pub fn velocity(&self) -> Option<f64> {
        match self {
            Status::Velocity(v) => Some(*v),
            Status::LightState(_) => None,
        }
    }

    /// Encode back into the JSON cell representation.
    pub fn to_json(&self) -> String {
        // Infallible for these payloads.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A status cell that is not a recognised payload.
#[derive(Debug, Clone, Error)]
#[error("malformed status {raw:?}: {reason}")]
pub struct StatusError {
    pub raw: String,
    pub reason: String,
}

/// Category of a recorded object, as named in the property table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    Car,
    Motorbike,
    Bicycle,
    Pedestrian,
    TrafficLight,
    Other(String),
}

impl ObjectCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectCategory::Car => "car",
            ObjectCategory::Motorbike => "motorbike",
            ObjectCategory::Bicycle => "bicycle",
            ObjectCategory::Pedestrian => "pedestrian",
            ObjectCategory::TrafficLight => "traffic_light",
            ObjectCategory::Other(name) => name,
        }
    }

    /// Map a property-table type name onto a category.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "car" => ObjectCategory::Car,
            "motorbike" => ObjectCategory::Motorbike,
            "bicycle" => ObjectCategory::Bicycle,
            "pedestrian" => ObjectCategory::Pedestrian,
            "traffic_light" => ObjectCategory::TrafficLight,
            other => ObjectCategory::Other(other.to_string()),
        }
    }
}

impl FromStr for ObjectCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the static property table.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub id: ObjectId,
    pub category: ObjectCategory,
    pub width: f64,
    pub length: f64,
}

/// One object's state at one tick, joined with its static category.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub timestamp: f64,
    pub id: ObjectId,
    pub category: ObjectCategory,
    pub center_x: f64,
    pub center_y: f64,
    /// Heading in radians
    pub heading: f64,
    pub status: Status,
}

impl TrackPoint {
    /// Planar Euclidean distance to a position.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.center_x - x).powi(2) + (self.center_y - y).powi(2)).sqrt()
    }
}

/// All non-excluded points sharing one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: f64,
    pub points: Vec<TrackPoint>,
}
