//! Scheduling vocabulary shared by the registry and its hosts

use crate::models::TimingEntry;
use crate::options::ScheduleConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source of timing entries, e.g. the browser performance timeline
pub trait TimingSource {
    /// Every entry currently known, resource and navigation alike
    fn timing_entries(&self) -> Vec<TimingEntry>;
}

/// Handle of an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerHandle(pub u64);

/// What an armed timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Next registry poll
    Poll,
    /// End of the footprint change quiet period
    FootprintDebounce,
}

/// One-shot timers provided by the host
///
/// Cancelling a handle that already fired or was already cancelled must be
/// a no-op.
pub trait TimerDriver {
    fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

/// Why a tick runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The poll timer fired
    Poll,
    /// An environment signal asked for an immediate refresh
    Reset,
}

/// Lifecycle signals from the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ContentLoaded,
    Resize,
    Scroll,
}

/// Polling phase of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Page still loading, poll fast
    Warmup,
    /// Initial footprint captured, poll slowly
    Steady,
}

impl Phase {
    pub fn interval(self, schedule: &ScheduleConfig) -> Duration {
        match self {
            Phase::Warmup => schedule.warmup_interval(),
            Phase::Steady => schedule.steady_interval(),
        }
    }
}
