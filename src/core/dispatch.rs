//! Bounded worker pool for per-candidate fan-out.
//!
//! Jobs are handed to at most `max_workers` scoped threads through a bounded
//! channel. Every job yields exactly one result, returned in submission
//! order; a panicking job is reported as a failure without disturbing its
//! siblings.

use crate::core::roles::{Assignment, RoleAssigner, SkipReason, WriteError};
use crate::core::windowing::SceneWindow;
use crate::track::types::ObjectId;
use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread;
use thiserror::Error;
use tracing::{debug, error, warn};

/// A job that panicked inside a worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task panicked: {0}")]
pub struct TaskPanic(pub String);

impl TaskPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskPanic(message)
    }
}

/// Failure of one candidate task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Panicked(#[from] TaskPanic),
}

/// Outcome of one candidate task.
#[derive(Debug)]
pub enum TaskOutcome {
    Written(PathBuf),
    Skipped(SkipReason),
    Failed(TaskError),
}

/// Outcome tagged with the candidate it belongs to.
#[derive(Debug)]
pub struct CandidateOutcome {
    pub agent_id: ObjectId,
    pub outcome: TaskOutcome,
}

/// Aggregated outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub written: usize,
    pub skipped_out_of_range: usize,
    pub skipped_insufficient_neighbors: usize,
    pub skipped_non_finite: usize,
    pub failed: usize,
}

impl DispatchSummary {
    pub fn from_outcomes(outcomes: &[CandidateOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.outcome {
                TaskOutcome::Written(_) => summary.written += 1,
                TaskOutcome::Skipped(SkipReason::ReferenceTickOutOfRange { .. }) => {
                    summary.skipped_out_of_range += 1
                }
                TaskOutcome::Skipped(SkipReason::InsufficientNeighbors { .. }) => {
                    summary.skipped_insufficient_neighbors += 1
                }
                TaskOutcome::Skipped(SkipReason::NonFiniteReference) => {
                    summary.skipped_non_finite += 1
                }
                TaskOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn merge(&mut self, other: &DispatchSummary) {
        self.written += other.written;
        self.skipped_out_of_range += other.skipped_out_of_range;
        self.skipped_insufficient_neighbors += other.skipped_insufficient_neighbors;
        self.skipped_non_finite += other.skipped_non_finite;
        self.failed += other.failed;
    }

    pub fn skipped(&self) -> usize {
        self.skipped_out_of_range + self.skipped_insufficient_neighbors + self.skipped_non_finite
    }
}

/// Bounded worker pool.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `task` over every job and return the results in job order.
    pub fn run<J, R, F>(&self, jobs: Vec<J>, task: F) -> Vec<Result<R, TaskPanic>>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> R + Sync,
    {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.max_workers.min(total);

        let (job_tx, job_rx) = bounded::<(usize, J)>(workers);
        let (result_tx, result_rx) = unbounded::<(usize, Result<R, TaskPanic>)>();
        let mut results: Vec<Option<Result<R, TaskPanic>>> = (0..total).map(|_| None).collect();

        thread::scope(|scope| {
            let task = &task;
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, job) in job_rx.iter() {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(job)))
                            .map_err(TaskPanic::from_payload);
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            for item in jobs.into_iter().enumerate() {
                if job_tx.send(item).is_err() {
                    break;
                }
            }
            drop(job_tx);

            for (index, outcome) in result_rx.iter() {
                results[index] = Some(outcome);
            }
        });

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(TaskPanic("worker exited early".to_string()))))
            .collect()
    }

    /// Fan out one task per distinct object id of `window`.
    pub fn dispatch_window(
        &self,
        assigner: &RoleAssigner,
        window: &SceneWindow,
    ) -> Vec<CandidateOutcome> {
        let candidates = window.object_ids();
        let results = self.run(candidates.clone(), |agent_id| {
            assigner.process(window, agent_id)
        });

        candidates
            .into_iter()
            .zip(results)
            .map(|(agent_id, result)| {
                let outcome = match result {
                    Ok(Ok(Assignment::Written(path))) => TaskOutcome::Written(path),
                    Ok(Ok(Assignment::Skipped(reason))) => {
                        debug!(
                            batch = assigner.batch(),
                            window = window.end_tick,
                            agent_id,
                            %reason,
                            "candidate skipped"
                        );
                        TaskOutcome::Skipped(reason)
                    }
                    Ok(Err(e)) => {
                        warn!(batch = assigner.batch(), agent_id, "sample write failed: {e}");
                        TaskOutcome::Failed(e.into())
                    }
                    Err(panic) => {
                        error!(batch = assigner.batch(), agent_id, "{panic}");
                        TaskOutcome::Failed(panic.into())
                    }
                };
                CandidateOutcome { agent_id, outcome }
            })
            .collect()
    }
}
