//! Window management for grouping ticks into fixed-length scene windows.
//!
//! Ticks are accumulated in strict timestamp order. A window is flushed when
//! the 1-indexed tick counter is greater than one and a multiple of the
//! configured window length. The counter keeps running across windows of one
//! batch. A trailing partial window at the end of a batch is dropped.

use crate::track::types::{ObjectId, Tick, TrackPoint};
use tracing::warn;

/// A completed, fixed-length run of ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneWindow {
    /// 1-indexed tick counter value at which this window was flushed
    pub end_tick: usize,
    /// Ticks in ascending timestamp order
    pub ticks: Vec<Tick>,
}

impl SceneWindow {
    /// Number of ticks in the window.
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// All rows of the window, tick by tick.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.ticks.iter().flat_map(|tick| tick.points.iter())
    }

    /// Distinct object ids in order of first appearance.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        for point in self.points() {
            if !ids.contains(&point.id) {
                ids.push(point.id);
            }
        }
        ids
    }
}

/// Explicit accumulator state threaded through windowing steps.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAccumulator {
    ticks_per_scene: usize,
    tick_counter: usize,
    buffer: Vec<Tick>,
}

impl WindowAccumulator {
    /// Start a fresh accumulator for one batch.
    pub fn new(ticks_per_scene: usize) -> Self {
        Self {
            ticks_per_scene,
            tick_counter: 0,
            buffer: Vec::new(),
        }
    }

    /// Append one tick, returning the next state and a window if one completed.
    pub fn push(mut self, tick: Tick) -> (Self, Option<SceneWindow>) {
        self.tick_counter += 1;
        self.buffer.push(tick);

        if self.ticks_per_scene > 0
            && self.tick_counter != 1
            && self.tick_counter % self.ticks_per_scene == 0
        {
            let window = SceneWindow {
                end_tick: self.tick_counter,
                ticks: std::mem::take(&mut self.buffer),
            };
            return (self, Some(window));
        }

        (self, None)
    }

    /// Ticks seen so far in this batch.
    pub fn tick_counter(&self) -> usize {
        self.tick_counter
    }

    /// Ticks buffered towards the next window.
    pub fn pending_ticks(&self) -> usize {
        self.buffer.len()
    }
}

/// Remove rows whose object type is excluded.
pub fn filter_excluded(mut tick: Tick, excluded: &[String]) -> Tick {
    tick.points
        .retain(|point| !excluded.iter().any(|e| e == point.category.as_str()));
    tick
}

/// Iterator adapter turning a tick stream into completed scene windows.
pub struct SceneWindows<I> {
    ticks: I,
    excluded: Vec<String>,
    accumulator: Option<WindowAccumulator>,
    dropped_ticks: usize,
}

impl<I: Iterator<Item = Tick>> SceneWindows<I> {
    pub fn new(ticks: I, ticks_per_scene: usize, excluded: Vec<String>) -> Self {
        Self {
            ticks,
            excluded,
            accumulator: Some(WindowAccumulator::new(ticks_per_scene)),
            dropped_ticks: 0,
        }
    }

    /// Ticks discarded as a trailing partial window; valid once exhausted.
    pub fn dropped_ticks(&self) -> usize {
        self.dropped_ticks
    }
}

impl<I: Iterator<Item = Tick>> Iterator for SceneWindows<I> {
    type Item = SceneWindow;

    fn next(&mut self) -> Option<SceneWindow> {
        let mut state = self.accumulator.take()?;

        for tick in self.ticks.by_ref() {
            let (next, completed) = state.push(filter_excluded(tick, &self.excluded));
            state = next;
            if let Some(window) = completed {
                self.accumulator = Some(state);
                return Some(window);
            }
        }

        // Partial tail windows are dropped so every emitted window has full length.
        self.dropped_ticks = state.pending_ticks();
        if self.dropped_ticks > 0 {
            warn!(
                ticks = self.dropped_ticks,
                total = state.tick_counter(),
                "dropping trailing partial window"
            );
        }
        None
    }
}
