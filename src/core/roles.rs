//! Role assignment for one focal object within one scene window.
//!
//! The focal object's position at the reference tick defines a neighbour
//! disc. Objects inside the disc are kept for the whole window; the focal
//! object becomes `AGENT`, one random neighbour `AV`, and the rest `OTHERS`.

use crate::config::Config;
use crate::core::sample::{sample_file_name, write_sample, Role, SampleColumn, SampleRow};
use crate::core::windowing::SceneWindow;
use crate::track::types::ObjectId;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a candidate produced no sample. These are expected outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("candidate has {available} ticks, reference tick needs {required}")]
    ReferenceTickOutOfRange { available: usize, required: usize },
    #[error("only {found} object(s) within radius")]
    InsufficientNeighbors { found: usize },
    #[error("candidate position at the reference tick is not finite")]
    NonFiniteReference,
}

/// A sample file could not be written.
#[derive(Debug, Error)]
#[error("cannot write sample {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    pub source: csv::Error,
}

/// Geometry parameters of role assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleParams {
    /// Zero-based index into the candidate's own rows
    pub reference_tick: usize,
    pub radius: f64,
}

impl RoleParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reference_tick: config.reference_tick(),
            radius: config.radius_around_agent,
        }
    }
}

/// Build the role-assigned rows for `agent_id`, or say why none exist.
pub fn assign_roles<R: Rng + ?Sized>(
    window: &SceneWindow,
    agent_id: ObjectId,
    params: &RoleParams,
    rng: &mut R,
) -> Result<Vec<SampleRow>, SkipReason> {
    let mut agent_rows = window.points().filter(|p| p.id == agent_id);
    let reference = match agent_rows.nth(params.reference_tick) {
        Some(point) => point,
        None => {
            let available = window.points().filter(|p| p.id == agent_id).count();
            return Err(SkipReason::ReferenceTickOutOfRange {
                available,
                required: params.reference_tick + 1,
            });
        }
    };
    if !(reference.center_x.is_finite() && reference.center_y.is_finite()) {
        return Err(SkipReason::NonFiniteReference);
    }

    let (agent_x, agent_y) = (reference.center_x, reference.center_y);
    let mut in_range: Vec<ObjectId> = Vec::new();
    for point in window
        .points()
        .filter(|p| p.timestamp == reference.timestamp)
    {
        if point.distance_to(agent_x, agent_y) <= params.radius && !in_range.contains(&point.id) {
            in_range.push(point.id);
        }
    }

    if in_range.len() < 2 {
        return Err(SkipReason::InsufficientNeighbors {
            found: in_range.len(),
        });
    }

    let others: Vec<ObjectId> = in_range
        .iter()
        .copied()
        .filter(|&id| id != agent_id)
        .collect();
    let av_id = match others.choose(rng) {
        Some(&id) => id,
        None => {
            return Err(SkipReason::InsufficientNeighbors {
                found: in_range.len(),
            })
        }
    };

    let rows = window
        .points()
        .filter(|p| in_range.contains(&p.id))
        .map(|p| {
            let role = if p.id == agent_id {
                Role::Agent
            } else if p.id == av_id {
                Role::Av
            } else {
                Role::Others
            };
            SampleRow::from_point(p, role)
        })
        .collect();

    Ok(rows)
}

/// Seed of the RNG used for one (window, candidate) task.
///
/// Derived only from stable inputs so the chosen AV does not depend on
/// which worker runs the task or in which order tasks finish.
pub fn task_seed(seed: u64, batch: &str, window_counter: usize, agent_id: ObjectId) -> u64 {
    let mut h = splitmix64(seed);
    for byte in batch.bytes() {
        h = splitmix64(h ^ byte as u64);
    }
    h = splitmix64(h ^ window_counter as u64);
    splitmix64(h ^ agent_id as u64)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Assigns roles for one batch and persists the resulting samples.
#[derive(Debug, Clone)]
pub struct RoleAssigner {
    batch: String,
    output_dir: PathBuf,
    seed: u64,
    params: RoleParams,
    columns: Vec<SampleColumn>,
}

/// Result of one candidate task that did not hit an I/O failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Written(PathBuf),
    Skipped(SkipReason),
}

impl RoleAssigner {
    pub fn new(batch: impl Into<String>, output_dir: &Path, seed: u64, config: &Config) -> Self {
        Self {
            batch: batch.into(),
            output_dir: output_dir.to_path_buf(),
            seed,
            params: RoleParams::from_config(config),
            columns: config.column_order.clone(),
        }
    }

    pub fn batch(&self) -> &str {
        &self.batch
    }

    /// Run role assignment for one candidate and write its sample file.
    pub fn process(
        &self,
        window: &SceneWindow,
        agent_id: ObjectId,
    ) -> Result<Assignment, WriteError> {
        let mut rng =
            ChaCha8Rng::seed_from_u64(task_seed(self.seed, &self.batch, window.end_tick, agent_id));

        let rows = match assign_roles(window, agent_id, &self.params, &mut rng) {
            Ok(rows) => rows,
            Err(reason) => return Ok(Assignment::Skipped(reason)),
        };

        let path = self
            .output_dir
            .join(sample_file_name(&self.batch, window.end_tick, agent_id));
        let write = || -> Result<(), csv::Error> {
            let file = std::fs::File::create(&path)?;
            write_sample(file, &rows, &self.columns)
        };
        write().map_err(|source| WriteError {
            path: path.clone(),
            source,
        })?;

        Ok(Assignment::Written(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::types::{ObjectCategory, Status, Tick, TrackPoint};

    fn point(ts: f64, id: ObjectId, x: f64, y: f64) -> TrackPoint {
        TrackPoint {
            timestamp: ts,
            id,
            category: ObjectCategory::Car,
            center_x: x,
            center_y: y,
            heading: 0.0,
            status: Status::Velocity(2.0),
        }
    }

    /// Window of `n` ticks; each object sits at a fixed position.
    fn window(n: usize, objects: &[(ObjectId, f64, f64)]) -> SceneWindow {
        SceneWindow {
            end_tick: n,
            ticks: (0..n)
                .map(|i| Tick {
                    timestamp: i as f64 * 0.1,
                    points: objects
                        .iter()
                        .map(|&(id, x, y)| point(i as f64 * 0.1, id, x, y))
                        .collect(),
                })
                .collect(),
        }
    }

    fn params() -> RoleParams {
        RoleParams {
            reference_tick: 20,
            radius: 50.0,
        }
    }

    #[test]
    fn test_far_objects_excluded() {
        let w = window(50, &[(1, 0.0, 0.0), (2, 30.0, 0.0), (3, 500.0, 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let rows = assign_roles(&w, 1, &params(), &mut rng).unwrap();

        assert_eq!(rows.len(), 100);
        assert!(rows.iter().all(|r| r.id != 3));
        assert!(rows.iter().filter(|r| r.id == 1).all(|r| r.role == Role::Agent));
        assert!(rows.iter().filter(|r| r.id == 2).all(|r| r.role == Role::Av));
    }

    #[test]
    fn test_exactly_one_av_among_many() {
        let objects: Vec<(ObjectId, f64, f64)> =
            (0..6).map(|id| (id, id as f64 * 5.0, 0.0)).collect();
        let w = window(30, &objects);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let rows = assign_roles(&w, 0, &params(), &mut rng).unwrap();

        let mut av_ids: Vec<ObjectId> =
            rows.iter().filter(|r| r.role == Role::Av).map(|r| r.id).collect();
        av_ids.dedup();
        assert_eq!(av_ids.len(), 1);
        assert_ne!(av_ids[0], 0);

        let others = rows.iter().filter(|r| r.role == Role::Others).count();
        assert_eq!(others, 4 * 30);
    }

    #[test]
    fn test_radius_is_inclusive() {
        let w = window(25, &[(1, 0.0, 0.0), (2, 30.0, 40.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(assign_roles(&w, 1, &params(), &mut rng).is_ok());
    }

    #[test]
    fn test_lonely_candidate_skipped() {
        let w = window(50, &[(1, 0.0, 0.0), (2, 51.0, 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            assign_roles(&w, 1, &params(), &mut rng),
            Err(SkipReason::InsufficientNeighbors { found: 1 })
        );
    }

    #[test]
    fn test_short_candidate_skipped() {
        let mut w = window(50, &[(1, 0.0, 0.0)]);
        // Object 2 appears only in the last ten ticks.
        for tick in w.ticks.iter_mut().skip(40) {
            let ts = tick.timestamp;
            tick.points.push(point(ts, 2, 1.0, 0.0));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            assign_roles(&w, 2, &params(), &mut rng),
            Err(SkipReason::ReferenceTickOutOfRange {
                available: 10,
                required: 21
            })
        );
    }

    #[test]
    fn test_neighbour_uses_reference_tick_position() {
        let mut w = window(50, &[(1, 0.0, 0.0)]);
        // Object 2 starts far away and is near only at the reference tick.
        for (i, tick) in w.ticks.iter_mut().enumerate() {
            let ts = tick.timestamp;
            let x = if i == 20 { 10.0 } else { 1000.0 };
            tick.points.push(point(ts, 2, x, 0.0));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let rows = assign_roles(&w, 1, &params(), &mut rng).unwrap();
        assert_eq!(rows.iter().filter(|r| r.id == 2).count(), 50);
    }

    #[test]
    fn test_task_seed_is_stable_and_distinct() {
        assert_eq!(task_seed(7, "batch00", 50, 3), task_seed(7, "batch00", 50, 3));
        assert_ne!(task_seed(7, "batch00", 50, 3), task_seed(7, "batch00", 50, 4));
        assert_ne!(task_seed(7, "batch00", 50, 3), task_seed(7, "batch01", 50, 3));
        assert_ne!(task_seed(7, "batch00", 50, 3), task_seed(8, "batch00", 50, 3));
    }

    #[test]
    fn test_process_writes_named_file() {
        let dir = std::env::temp_dir().join(format!("scene-sampler-roles-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let assigner = RoleAssigner::new("batch00", &dir, 11, &Config::default());

        let w = window(50, &[(1, 0.0, 0.0), (2, 3.0, 4.0)]);
        let outcome = assigner.process(&w, 2).unwrap();
        let expected = dir.join("batch00_000000000050_0002.csv");
        assert_eq!(outcome, Assignment::Written(expected.clone()));
        assert!(expected.exists());

        let lonely = window(50, &[(1, 0.0, 0.0)]);
        assert!(matches!(
            assigner.process(&lonely, 1).unwrap(),
            Assignment::Skipped(SkipReason::InsufficientNeighbors { .. })
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unwritable_output_is_error() {
        let missing = std::env::temp_dir()
            .join(format!("scene-sampler-missing-{}", uuid::Uuid::new_v4()))
            .join("nested");
        let assigner = RoleAssigner::new("batch00", &missing, 11, &Config::default());
        let w = window(50, &[(1, 0.0, 0.0), (2, 3.0, 4.0)]);
        assert!(assigner.process(&w, 1).is_err());
    }
}
