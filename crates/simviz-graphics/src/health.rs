//! Rendering-thread health counters.

use std::time::{Duration, Instant};

/// Errors tolerated before a manager reports itself unhealthy.
const ERROR_BUDGET: u64 = 10;

#[derive(Debug, Clone, Default)]
pub(crate) struct HealthState {
    pub last_pass: Option<Instant>,
    pub passes: u64,
    pub draws: u64,
    pub errors: u64,
}

impl HealthState {
    pub fn record_pass(&mut self) {
        self.passes += 1;
        self.last_pass = Some(Instant::now());
    }

    pub fn record_draw(&mut self) {
        self.draws += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Snapshot returned by `WindowManager::health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Rendering thread (or inline executor) still accepts work
    pub running: bool,
    pub passes: u64,
    pub draws: u64,
    pub errors: u64,
    /// Mailbox writes that overwrote an unconsumed request
    pub coalesced: u64,
    /// A render request is waiting in the mailbox
    pub pending_request: bool,
    pub since_last_pass: Option<Duration>,
}

impl HealthReport {
    pub(crate) fn new(
        state: &HealthState,
        running: bool,
        coalesced: u64,
        pending_request: bool,
    ) -> Self {
        Self {
            running,
            passes: state.passes,
            draws: state.draws,
            errors: state.errors,
            coalesced,
            pending_request,
            since_last_pass: state.last_pass.map(|at| at.elapsed()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.running && self.errors < ERROR_BUDGET
    }
}
