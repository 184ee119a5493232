//! Shared health state for the /health endpoint.
//! Updated by the tracker, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tracker::PassSummary;

#[derive(Default)]
pub struct HealthState {
    /// True while the scheduler loop is alive.
    pub tracker_running: AtomicBool,
    /// True while a tracking pass (scheduled or manual) is executing.
    pub pass_in_progress: AtomicBool,
    pub passes_completed: AtomicU64,
    /// Millisecond timestamp of the last finished pass (0 = none).
    pub last_pass_at_ms: AtomicI64,
    pub last_pass_checked: AtomicU64,
    pub last_pass_failures: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub tracker_running: bool,
    pub pass_in_progress: bool,
    pub passes_completed: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_pass_checked: u64,
    pub last_pass_failures: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tracker_running(&self, v: bool) {
        self.tracker_running.store(v, Ordering::Relaxed);
    }

    pub fn pass_started(&self) {
        self.pass_in_progress.store(true, Ordering::Relaxed);
    }

    pub fn pass_finished(&self, at: DateTime<Utc>, summary: &PassSummary) {
        self.last_pass_at_ms.store(at.timestamp_millis(), Ordering::Relaxed);
        self.last_pass_checked.store(summary.checked as u64, Ordering::Relaxed);
        self.last_pass_failures.store(summary.failures as u64, Ordering::Relaxed);
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.pass_in_progress.store(false, Ordering::Relaxed);
    }

    pub fn tracker_running(&self) -> bool {
        self.tracker_running.load(Ordering::Relaxed)
    }

    pub fn last_pass_at(&self) -> Option<DateTime<Utc>> {
        match self.last_pass_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            tracker_running: self.tracker_running(),
            pass_in_progress: self.pass_in_progress.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            last_pass_at: self.last_pass_at(),
            last_pass_checked: self.last_pass_checked.load(Ordering::Relaxed),
            last_pass_failures: self.last_pass_failures.load(Ordering::Relaxed),
        }
    }
}
