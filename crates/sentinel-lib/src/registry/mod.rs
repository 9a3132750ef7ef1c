//! Resource registry and poll scheduling
//!
//! The registry owns one [`ResourceRecord`] per URL. Every environment
//! signal and every poll timer funnels into [`ResourceRegistry::tick`],
//! which re-reads the timing entries, updates the records, checks whether
//! the initial footprint can be frozen and arms the next poll.

mod schedule;


pub use schedule::{Phase, Signal, TimerDriver, TimerHandle, TimerKind, TimingSource, Trigger};

use crate::error::Result;
use crate::models::TimingSample;
use crate::options::SentinelOptions;
use crate::rating::rating_for;
use crate::resource::ResourceRecord;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Lifecycle events produced by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A record was created or its size changed
    ResourceUpdated {
        url: String,
        size_bytes: u64,
        created: bool,
    },
    /// The initial footprint was frozen
    InitialFootprint { bytes: u64 },
}

/// What a tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub trigger: Trigger,
    /// Reset folded into the previous one, nothing enumerated
    pub coalesced: bool,
    pub entries_seen: usize,
    /// Malformed entries
    pub entries_skipped: usize,
    /// Entries rejected by the skip predicate
    pub entries_filtered: usize,
    pub events: Vec<RegistryEvent>,
    /// Delay of the poll armed at the end of the tick
    pub next_poll_in: Duration,
}

impl TickReport {
    fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            coalesced: false,
            entries_seen: 0,
            entries_skipped: 0,
            entries_filtered: 0,
            events: Vec::new(),
            next_poll_in: Duration::ZERO,
        }
    }
}

/// Registry of every resource seen on the page
pub struct ResourceRegistry {
    /// url -> record
    records: HashMap<String, ResourceRecord>,
    options: Arc<SentinelOptions>,
    initial_bytes: Option<u64>,
    phase: Phase,
    loaded_at: Option<Instant>,
    last_reset_at: Option<Instant>,
    pending: Option<TimerHandle>,
}

impl ResourceRegistry {
    pub fn new(options: Arc<SentinelOptions>) -> Self {
        Self {
            records: HashMap::new(),
            options,
            initial_bytes: None,
            phase: Phase::Warmup,
            loaded_at: None,
            last_reset_at: None,
            pending: None,
        }
    }

    /// Track a sample
    ///
    /// Returns an event when a record was created or its size changed, and
    /// nothing for a sample that repeats the known size.
    pub fn add_or_update(&mut self, sample: &TimingSample) -> Result<Option<RegistryEvent>> {
        if let Some(record) = self.records.get_mut(&sample.url) {
            if !record.update_if_needed(sample)? {
                return Ok(None);
            }
            return Ok(Some(RegistryEvent::ResourceUpdated {
                url: sample.url.clone(),
                size_bytes: record.size_bytes(),
                created: false,
            }));
        }

        let record = ResourceRecord::new(sample, Arc::clone(&self.options));
        let event = RegistryEvent::ResourceUpdated {
            url: sample.url.clone(),
            size_bytes: record.size_bytes(),
            created: true,
        };
        self.records.insert(sample.url.clone(), record);
        Ok(Some(event))
    }

    /// Sum of all record sizes
    pub fn total_bytes(&self) -> u64 {
        self.records
            .values()
            .map(ResourceRecord::size_bytes)
            .fold(0, u64::saturating_add)
    }

    pub fn get(&self, url: &str) -> Option<&ResourceRecord> {
        self.records.get(url)
    }

    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Footprint frozen shortly after load-complete
    pub fn initial_bytes(&self) -> Option<u64> {
        self.initial_bytes
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn loaded_at(&self) -> Option<Instant> {
        self.loaded_at
    }

    /// Poll timer currently armed
    pub fn pending_timer(&self) -> Option<TimerHandle> {
        self.pending
    }

    pub fn options(&self) -> &Arc<SentinelOptions> {
        &self.options
    }

    /// Route a document signal into a reset tick
    pub fn handle_signal<E>(&mut self, signal: Signal, now: Instant, env: &mut E) -> TickReport
    where
        E: TimingSource + TimerDriver + ?Sized,
    {
        if signal == Signal::ContentLoaded && self.loaded_at.is_none() {
            debug!("Document content loaded");
            self.loaded_at = Some(now);
        }
        self.tick(Trigger::Reset, now, env)
    }

    /// Run one update cycle and arm the next poll
    ///
    /// A reset within the coalesce window of the previous executed reset
    /// only re-arms a trailing poll for the rest of the window, so a burst
    /// of resize or scroll events costs one enumeration and leaves exactly
    /// one timer armed.
    pub fn tick<E>(&mut self, trigger: Trigger, now: Instant, env: &mut E) -> TickReport
    where
        E: TimingSource + TimerDriver + ?Sized,
    {
        let mut report = TickReport::new(trigger);

        if trigger == Trigger::Reset {
            let window = self.options.schedule.reset_coalesce();
            if let Some(last) = self.last_reset_at {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < window {
                    let remaining = window - elapsed;
                    self.arm_poll(remaining, env);
                    report.coalesced = true;
                    report.next_poll_in = remaining;
                    trace!(remaining_ms = remaining.as_millis() as u64, "Reset coalesced");
                    return report;
                }
            }
            self.last_reset_at = Some(now);
        }

        self.sync_entries(env, &mut report);
        self.try_capture_initial(now, &mut report);

        let delay = self.phase.interval(&self.options.schedule);
        self.arm_poll(delay, env);
        report.next_poll_in = delay;

        trace!(
            trigger = ?trigger,
            entries = report.entries_seen,
            updates = report.events.len(),
            total_bytes = self.total_bytes(),
            "Tick complete"
        );
        report
    }

    /// Drop the armed poll, e.g. on shutdown
    pub fn cancel<E: TimerDriver + ?Sized>(&mut self, env: &mut E) {
        if let Some(handle) = self.pending.take() {
            env.cancel(handle);
        }
    }

    fn arm_poll<E: TimerDriver + ?Sized>(&mut self, delay: Duration, env: &mut E) {
        self.cancel(env);
        self.pending = Some(env.arm(TimerKind::Poll, delay));
    }

    /// Feed every current timing entry through `add_or_update`
    fn sync_entries<E: TimingSource + ?Sized>(&mut self, env: &E, report: &mut TickReport) {
        for entry in env.timing_entries() {
            report.entries_seen += 1;

            let sample = match TimingSample::try_from(&entry) {
                Ok(sample) => sample,
                Err(e) => {
                    report.entries_skipped += 1;
                    debug!(error = %e, "Skipping timing entry");
                    continue;
                }
            };

            if self.options.skips(&sample.url) {
                report.entries_filtered += 1;
                continue;
            }

            match self.add_or_update(&sample) {
                Ok(Some(event)) => report.events.push(event),
                Ok(None) => {}
                Err(e) => {
                    report.entries_skipped += 1;
                    warn!(url = %sample.url, error = %e, "Failed to update resource");
                }
            }
        }
    }

    fn try_capture_initial(&mut self, now: Instant, report: &mut TickReport) {
        if self.initial_bytes.is_some() {
            return;
        }
        let Some(loaded_at) = self.loaded_at else {
            return;
        };
        if now.saturating_duration_since(loaded_at) < self.options.schedule.initial_footprint_delay()
        {
            return;
        }

        let bytes = self.total_bytes();
        self.initial_bytes = Some(bytes);
        self.phase = Phase::Steady;
        info!(
            initial_bytes = bytes,
            rating = %rating_for(bytes),
            resources = self.records.len(),
            "Initial footprint captured, switching to steady polling"
        );
        report.events.push(RegistryEvent::InitialFootprint { bytes });
    }
}
