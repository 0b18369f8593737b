//! Trailing-edge debouncing of settled changes
//!
//! The debouncer holds a single deadline. Every recorded change pushes the
//! deadline out to `now + quiet`; a trigger fires only once the deadline has
//! passed without another change. Time is passed in explicitly so the
//! coalescing rules can be driven without a running clock.

use crate::events::Trigger;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Collapses bursts of changes into one trigger per quiet period
#[derive(Debug)]
pub struct TrailingDebouncer {
    /// Quiet window
    quiet: Duration,
    /// When the pending trigger fires, if any
    deadline: Option<Instant>,
    /// Changes folded into the pending trigger
    pending: usize,
}

impl TrailingDebouncer {
    /// Create a new debouncer with the given quiet window
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
            pending: 0,
        }
    }

    /// Record a change, cancelling and restarting the pending timer
    pub fn record(&mut self, now: Instant) {
        self.pending += 1;
        self.deadline = Some(now + self.quiet);
        trace!(pending = self.pending, "Debounce timer restarted");
    }

    /// Deadline of the pending trigger
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a trigger is waiting for its quiet window to elapse
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire the pending trigger if its quiet window has elapsed at `now`
    ///
    /// Changes observed at the deadline instant itself must be recorded
    /// before calling this, so they extend the window instead of missing it.
    pub fn poll_fire(&mut self, now: Instant) -> Option<Trigger> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    fn take(&mut self) -> Option<Trigger> {
        self.deadline = None;
        let coalesced = std::mem::take(&mut self.pending);
        Some(Trigger::new(coalesced))
    }
}
