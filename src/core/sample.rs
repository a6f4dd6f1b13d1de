//! Role-assigned sample rows and their on-disk representation.

use crate::track::types::{ObjectId, Status, TrackPoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Role of an object inside one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// The focal object the sample is centred on
    Agent,
    /// One randomly chosen neighbour
    Av,
    /// Every other retained neighbour
    Others,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "AGENT",
            Role::Av => "AV",
            Role::Others => "OTHERS",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column of an emitted sample file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleColumn {
    Timestamp,
    Id,
    ObjectType,
    CenterX,
    CenterY,
    Heading,
    Status,
}

impl SampleColumn {
    /// Canonical column order of the trajectory format.
    pub const CANONICAL: [SampleColumn; 7] = [
        SampleColumn::Timestamp,
        SampleColumn::Id,
        SampleColumn::ObjectType,
        SampleColumn::CenterX,
        SampleColumn::CenterY,
        SampleColumn::Heading,
        SampleColumn::Status,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            SampleColumn::Timestamp => "timestamp",
            SampleColumn::Id => "id",
            SampleColumn::ObjectType => "object_type",
            SampleColumn::CenterX => "center_x",
            SampleColumn::CenterY => "center_y",
            SampleColumn::Heading => "heading",
            SampleColumn::Status => "status",
        }
    }
}

/// One row of a role-assigned sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp: f64,
    pub id: ObjectId,
    pub role: Role,
    pub center_x: f64,
    pub center_y: f64,
    pub heading: f64,
    pub status: Status,
}

impl SampleRow {
    pub fn from_point(point: &TrackPoint, role: Role) -> Self {
        Self {
            timestamp: point.timestamp,
            id: point.id,
            role,
            center_x: point.center_x,
            center_y: point.center_y,
            heading: point.heading,
            status: point.status,
        }
    }

    fn field(&self, column: SampleColumn) -> String {
        match column {
            SampleColumn::Timestamp => self.timestamp.to_string(),
            SampleColumn::Id => self.id.to_string(),
            SampleColumn::ObjectType => self.role.as_str().to_string(),
            SampleColumn::CenterX => self.center_x.to_string(),
            SampleColumn::CenterY => self.center_y.to_string(),
            SampleColumn::Heading => self.heading.to_string(),
            SampleColumn::Status => self.status.to_json(),
        }
    }
}

/// A sample row as read back from disk; the status cell is kept raw so that
/// a malformed payload is reported by whoever interprets it.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleRecord {
    pub timestamp: f64,
    pub id: ObjectId,
    pub object_type: String,
    pub center_x: f64,
    pub center_y: f64,
    pub heading: f64,
    pub status: String,
}

impl SampleRecord {
    pub fn is_agent(&self) -> bool {
        self.object_type == Role::Agent.as_str()
    }
}

/// Deterministic, corpus-unique sample file name.
pub fn sample_file_name(batch: &str, window_counter: usize, agent_id: ObjectId) -> String {
    format!("{batch}_{window_counter:012}_{agent_id:04}.csv")
}

/// Write rows as CSV in the given column order.
pub fn write_sample<W: Write>(
    writer: W,
    rows: &[SampleRow],
    columns: &[SampleColumn],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(columns.iter().map(|c| c.header()))?;
    for row in rows {
        writer.write_record(columns.iter().map(|&c| row.field(c)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of a sample file, matching columns by header name.
pub fn read_sample(path: &Path) -> Result<Vec<SampleRecord>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize().collect()
}
