//! Debounced footprint change notification
//!
//! Resource updates arrive in bursts while a page loads. Each update pushes
//! the quiet-period timer back; once it fires, the current total is compared
//! with the last total that was reported and surfaced only if it grew enough.

use crate::models::FootprintResult;
use crate::options::ScheduleConfig;
use crate::registry::{TimerDriver, TimerHandle, TimerKind};
use std::time::Duration;
use tracing::trace;

/// Last-write-wins debouncer for footprint change reports
#[derive(Debug)]
pub struct FootprintDebouncer {
    quiet_period: Duration,
    min_delta_bytes: u64,
    last_reported: u64,
    pending: Option<TimerHandle>,
}

impl FootprintDebouncer {
    pub fn new(schedule: &ScheduleConfig) -> Self {
        Self {
            quiet_period: schedule.footprint_debounce(),
            min_delta_bytes: schedule.min_footprint_delta_bytes,
            last_reported: 0,
            pending: None,
        }
    }

    /// Total last surfaced to listeners
    pub fn last_reported(&self) -> u64 {
        self.last_reported
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Restart the quiet period
    pub fn touch<D: TimerDriver + ?Sized>(&mut self, timers: &mut D) {
        self.cancel(timers);
        self.pending = Some(timers.arm(TimerKind::FootprintDebounce, self.quiet_period));
    }

    pub fn cancel<D: TimerDriver + ?Sized>(&mut self, timers: &mut D) {
        if let Some(handle) = self.pending.take() {
            timers.cancel(handle);
        }
    }

    /// Quiet period elapsed with `total_bytes` on the page
    ///
    /// Returns the footprint to report when the total grew by more than the
    /// minimum delta since the last report. Shrinking totals and small
    /// growth are swallowed and do not move the reference point.
    pub fn fire(&mut self, total_bytes: u64) -> Option<FootprintResult> {
        self.pending = None;

        let growth = total_bytes.saturating_sub(self.last_reported);
        if growth <= self.min_delta_bytes {
            trace!(total_bytes, growth, "Footprint change below reporting delta");
            return None;
        }

        let result = FootprintResult::new(total_bytes, self.last_reported);
        self.last_reported = total_bytes;
        Some(result)
    }
}
