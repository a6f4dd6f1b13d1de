//! On-disk track store for one recorded batch.
//!
//! Loads the state and property tables, inner-joins them on object id and
//! exposes the result grouped by timestamp.

use crate::config::BatchLayout;
use crate::track::types::{ObjectCategory, ObjectId, ObjectProperty, Status, Tick, TrackPoint};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Raw row of the per-tick state table.
#[derive(Debug, Deserialize)]
struct StateRecord {
    timestamp: f64,
    id: ObjectId,
    center_x: f64,
    center_y: f64,
    heading: f64,
    status: String,
}

/// Raw row of the property table.
#[derive(Debug, Deserialize)]
struct PropertyRecord {
    id: ObjectId,
    #[serde(rename = "type")]
    object_type: String,
    width: f64,
    length: f64,
}

/// Errors raised while loading a batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("{path} row {row}: {source}")]
    Status {
        path: PathBuf,
        row: usize,
        source: crate::track::types::StatusError,
    },
}

/// Joined, timestamp-ordered track table of one batch.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    points: Vec<TrackPoint>,
    properties: HashMap<ObjectId, ObjectProperty>,
    unmatched_rows: usize,
}

impl TrackStore {
    /// Load a batch directory using the configured file names.
    pub fn load(batch_dir: &Path, layout: &BatchLayout) -> Result<Self, StoreError> {
        let property_path = batch_dir.join(&layout.property_file);
        let state_path = batch_dir.join(&layout.state_file);

        let properties = read_properties(open(&property_path)?, &property_path)?;
        let store = Self::from_readers(properties, open(&state_path)?, &state_path)?;

        debug!(
            batch = %batch_dir.display(),
            points = store.points.len(),
            objects = store.properties.len(),
            "loaded track store"
        );
        if store.unmatched_rows > 0 {
            warn!(
                batch = %batch_dir.display(),
                rows = store.unmatched_rows,
                "dropped state rows without a property entry"
            );
        }

        Ok(store)
    }

    /// Build a store from in-memory tables.
    pub fn from_parts(properties: Vec<ObjectProperty>, states: Vec<TrackPoint>) -> Self {
        let properties: HashMap<ObjectId, ObjectProperty> =
            properties.into_iter().map(|p| (p.id, p)).collect();

        let mut unmatched_rows = 0;
        let mut points: Vec<TrackPoint> = states
            .into_iter()
            .filter_map(|mut point| match properties.get(&point.id) {
                Some(property) => {
                    point.category = property.category.clone();
                    Some(point)
                }
                None => {
                    unmatched_rows += 1;
                    None
                }
            })
            .collect();

        // Stable: rows of one tick keep their recorded order.
        points.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Self {
            points,
            properties,
            unmatched_rows,
        }
    }

    fn from_readers<R: Read>(
        properties: Vec<ObjectProperty>,
        state: R,
        state_path: &Path,
    ) -> Result<Self, StoreError> {
        let mut reader = csv::Reader::from_reader(state);
        let mut states = Vec::new();

        for (row, record) in reader.deserialize::<StateRecord>().enumerate() {
            let record = record.map_err(|source| StoreError::Csv {
                path: state_path.to_path_buf(),
                source,
            })?;
            let status = Status::parse(&record.status).map_err(|source| StoreError::Status {
                path: state_path.to_path_buf(),
                row,
                source,
            })?;
            states.push(TrackPoint {
                timestamp: record.timestamp,
                id: record.id,
                // Filled in by the join.
                category: ObjectCategory::Other(String::new()),
                center_x: record.center_x,
                center_y: record.center_y,
                heading: record.heading,
                status,
            });
        }

        Ok(Self::from_parts(properties, states))
    }

    /// All joined points in timestamp order.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Static properties of one object.
    pub fn property(&self, id: ObjectId) -> Option<&ObjectProperty> {
        self.properties.get(&id)
    }

    /// Number of state rows dropped by the join.
    pub fn unmatched_rows(&self) -> usize {
        self.unmatched_rows
    }

    /// Number of distinct timestamps.
    pub fn tick_count(&self) -> usize {
        self.ticks().count()
    }

    /// Iterate over groups of equal timestamp in ascending order.
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        self.points
            .chunk_by(|a, b| a.timestamp == b.timestamp)
            .map(|group| Tick {
                timestamp: group[0].timestamp,
                points: group.to_vec(),
            })
    }
}

fn open(path: &Path) -> Result<std::fs::File, StoreError> {
    std::fs::File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_properties<R: Read>(input: R, path: &Path) -> Result<Vec<ObjectProperty>, StoreError> {
    let mut reader = csv::Reader::from_reader(input);
    reader
        .deserialize::<PropertyRecord>()
        .map(|record| {
            let record = record.map_err(|source| StoreError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(ObjectProperty {
                id: record.id,
                category: ObjectCategory::from_name(&record.object_type),
                width: record.width,
                length: record.length,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPERTIES: &str = "id,type,width,length\n\
                              0,car,2.0,4.5\n\
                              1,motorbike,0.8,2.1\n\
                              2,traffic_light,0.5,0.5\n";

    const STATES: &str = "timestamp,id,center_x,center_y,heading,status\n\
                          1.1,1,5.0,0.0,0.0,\"{\"\"velocity\"\": 2.0}\"\n\
                          1.0,0,0.0,0.0,0.0,\"{\"\"velocity\"\": 1.0}\"\n\
                          1.0,2,9.0,9.0,0.0,\"{\"\"light_state\"\": \"\"RED\"\"}\"\n\
                          1.0,7,1.0,1.0,0.0,\"{\"\"velocity\"\": 0.0}\"\n\
                          1.1,0,0.1,0.0,0.0,\"{\"\"velocity\"\": 1.0}\"\n";

    fn load() -> TrackStore {
        let properties = read_properties(PROPERTIES.as_bytes(), Path::new("p.csv")).unwrap();
        TrackStore::from_readers(properties, STATES.as_bytes(), Path::new("s.csv")).unwrap()
    }

    #[test]
    fn test_inner_join_drops_unknown_ids() {
        let store = load();
        assert_eq!(store.points().len(), 4);
        assert_eq!(store.unmatched_rows(), 1);
        assert!(store.points().iter().all(|p| p.id != 7));
        assert_eq!(store.property(1).unwrap().category, ObjectCategory::Motorbike);
    }

    #[test]
    fn test_ticks_grouped_in_timestamp_order() {
        let store = load();
        let ticks: Vec<Tick> = store.ticks().collect();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].timestamp, 1.0);
        assert_eq!(
            ticks[0].points.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(
            ticks[1].points.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 0]
        );
        assert_eq!(ticks[0].points[1].category, ObjectCategory::TrafficLight);
    }

    #[test]
    fn test_malformed_status_fails_batch() {
        let states = "timestamp,id,center_x,center_y,heading,status\n\
                      1.0,0,0.0,0.0,0.0,oops\n";
        let properties = read_properties(PROPERTIES.as_bytes(), Path::new("p.csv")).unwrap();
        let err = TrackStore::from_readers(properties, states.as_bytes(), Path::new("s.csv"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { row: 0, .. }));
    }

    #[test]
    fn test_missing_batch_is_io_error() {
        let missing = std::env::temp_dir().join(format!("no-batch-{}", uuid::Uuid::new_v4()));
        let err = TrackStore::load(&missing, &BatchLayout::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
