//! Task timing
//!
//! Correlates per-host results with the start of their task. Entries are
//! keyed by the engine's task identifier, which is stable across every host
//! the task runs on, so a lookup never removes the entry.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time for the tracker and the run duration
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Useful for replaying recorded runs and for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Start-time table keyed by task identifier
#[derive(Debug, Default)]
pub struct TimingTracker {
    starts: Mutex<HashMap<String, Instant>>,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a task now.
    pub fn start(&self, task_id: &str) {
        self.start_at(task_id, Instant::now());
    }

    /// Record the start of a task. A later start for the same id wins.
    pub fn start_at(&self, task_id: &str, at: Instant) {
        self.lock().insert(task_id.to_string(), at);
    }

    /// Seconds since the task started, rounded to two decimals.
    pub fn duration_since(&self, task_id: &str) -> Option<f64> {
        self.duration_since_at(task_id, Instant::now())
    }

    /// Seconds between the task's start and `at`, or `None` for an unknown id.
    ///
    /// An unknown id is normal: the start event may have happened before the
    /// bridge existed or under a different play retention window.
    pub fn duration_since_at(&self, task_id: &str, at: Instant) -> Option<f64> {
        let start = *self.lock().get(task_id)?;
        Some(round_secs(at.saturating_duration_since(start)))
    }

    /// Forget every recorded start.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.starts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Seconds rounded to two decimal places.
pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}
