//! Core sample generation.
//!
//! This module contains:
//! - Scene windowing of the tick stream into fixed-length windows
//! - Role assignment for one focal object within one window
//! - The bounded worker pool fanning candidates out per window
//! - The sample row schema and file naming

pub mod dispatch;
pub mod roles;
pub mod sample;
pub mod windowing;

// Re-export commonly used types
pub use dispatch::{CandidateOutcome, DispatchSummary, Dispatcher, TaskError, TaskOutcome, TaskPanic};
pub use roles::{assign_roles, Assignment, RoleAssigner, RoleParams, SkipReason, WriteError};
pub use sample::{sample_file_name, Role, SampleColumn, SampleRecord, SampleRow};
pub use windowing::{SceneWindow, SceneWindows, WindowAccumulator};
