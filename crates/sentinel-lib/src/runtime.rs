//! Host runtime
//!
//! Everything needed to drive a [`Sentinel`] outside a browser: a message
//! format for timing entries, signals and layout snapshots, a deadline
//! based timer driver, a host buffering what it was told, and the tokio
//! loop tying them together.

use crate::hints::{Hint, HintKey, HintRenderer};
use crate::models::TimingEntry;
use crate::options::SentinelOptions;
use crate::placement::RenderedElement;
use crate::registry::{Signal, TimerDriver, TimerHandle, TimerKind, TimingSource};
use crate::sentinel::{DocumentView, FootprintListener, Sentinel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

/// Upper bound on a single idle wait when no timer is armed
const IDLE_WAIT: Duration = Duration::from_secs(3600);

fn default_device_pixel_ratio() -> f64 {
    1.0
}

/// Message from the environment being observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// New or refreshed timing entries
    Entries { entries: Vec<TimingEntry> },
    /// Document lifecycle signal
    Signal { signal: Signal },
    /// Snapshot of the laid-out document
    Layout {
        #[serde(default = "default_device_pixel_ratio")]
        device_pixel_ratio: f64,
        #[serde(default)]
        elements: Vec<RenderedElement>,
    },
}

/// Timer driver keeping absolute deadlines
///
/// Deadlines are computed from the clock last passed to [`set_now`], so the
/// same driver serves a wall clock and a virtual replay clock.
///
/// [`set_now`]: DeadlineTimers::set_now
#[derive(Debug)]
pub struct DeadlineTimers {
    now: Instant,
    next_id: u64,
    armed: BTreeMap<TimerHandle, (TimerKind, Instant)>,
}

impl DeadlineTimers {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            next_id: 0,
            armed: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn set_now(&mut self, now: Instant) {
        self.now = now;
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Armed timers of one kind
    pub fn count(&self, kind: TimerKind) -> usize {
        self.armed.values().filter(|(k, _)| *k == kind).count()
    }

    /// Earliest armed deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|(_, deadline)| *deadline).min()
    }

    /// Remove and return the earliest timer due at `now`
    ///
    /// Timers sharing a deadline come out in arming order.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerHandle, TimerKind, Instant)> {
        let (handle, kind, deadline) = self
            .armed
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .min_by_key(|(handle, (_, deadline))| (*deadline, **handle))
            .map(|(handle, (kind, deadline))| (*handle, *kind, *deadline))?;
        self.armed.remove(&handle);
        Some((handle, kind, deadline))
    }
}

impl TimerDriver for DeadlineTimers {
    fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.armed.insert(handle, (kind, self.now + delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.remove(&handle);
    }
}

/// Host fed by [`HostMessage`]s
///
/// Timing entries accumulate like a performance timeline, except that a
/// later entry for the same name replaces the earlier one. The layout is
/// whatever the last snapshot said.
#[derive(Debug)]
pub struct BufferedHost<R> {
    entries: Vec<TimingEntry>,
    device_pixel_ratio: f64,
    elements: Vec<RenderedElement>,
    timers: DeadlineTimers,
    renderer: R,
}

impl<R: HintRenderer> BufferedHost<R> {
    pub fn new(renderer: R, now: Instant) -> Self {
        Self {
            entries: Vec::new(),
            device_pixel_ratio: default_device_pixel_ratio(),
            elements: Vec::new(),
            timers: DeadlineTimers::new(now),
            renderer,
        }
    }

    /// Absorb a message; returns the signal to dispatch, if any
    pub fn apply(&mut self, message: HostMessage) -> Option<Signal> {
        match message {
            HostMessage::Entries { entries } => {
                for entry in entries {
                    self.push_entry(entry);
                }
                None
            }
            HostMessage::Layout {
                device_pixel_ratio,
                elements,
            } => {
                self.device_pixel_ratio = device_pixel_ratio;
                self.elements = elements;
                None
            }
            HostMessage::Signal { signal } => Some(signal),
        }
    }

    fn push_entry(&mut self, entry: TimingEntry) {
        let existing = entry.name.as_ref().and_then(|name| {
            self.entries
                .iter()
                .position(|e| e.name.as_ref() == Some(name) && e.entry_type == entry.entry_type)
        });
        match existing {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn entries(&self) -> &[TimingEntry] {
        &self.entries
    }

    pub fn timers(&self) -> &DeadlineTimers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut DeadlineTimers {
        &mut self.timers
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<R> TimingSource for BufferedHost<R> {
    fn timing_entries(&self) -> Vec<TimingEntry> {
        self.entries.clone()
    }
}

impl<R> TimerDriver for BufferedHost<R> {
    fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.timers.arm(kind, delay)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.timers.cancel(handle);
    }
}

impl<R> DocumentView for BufferedHost<R> {
    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn elements(&self) -> Vec<RenderedElement> {
        self.elements.clone()
    }
}

impl<R: HintRenderer> HintRenderer for BufferedHost<R> {
    fn attach(&mut self, hint: &Hint) {
        self.renderer.attach(hint);
    }

    fn update(&mut self, hint: &Hint) {
        self.renderer.update(hint);
    }

    fn remove(&mut self, key: &HintKey) {
        self.renderer.remove(key);
    }
}

/// Sentinel bound to a buffered host
pub struct SentinelLoop<L: FootprintListener, R: HintRenderer> {
    sentinel: Sentinel<L>,
    host: BufferedHost<R>,
    started: bool,
    settle: Duration,
}

impl<L: FootprintListener, R: HintRenderer> SentinelLoop<L, R> {
    pub fn new(sentinel: Sentinel<L>, host: BufferedHost<R>) -> Self {
        Self {
            sentinel,
            host,
            started: false,
            settle: Duration::ZERO,
        }
    }

    /// Keep firing timers for `settle` after the message channel closes
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Build a loop from options, with the host clock starting at `now`
    pub fn from_options(
        options: SentinelOptions,
        listener: L,
        renderer: R,
        now: Instant,
    ) -> Result<Self> {
        let sentinel = Sentinel::new(options, listener).context("Invalid sentinel options")?;
        Ok(Self::new(sentinel, BufferedHost::new(renderer, now)))
    }

    pub fn sentinel(&self) -> &Sentinel<L> {
        &self.sentinel
    }

    pub fn sentinel_mut(&mut self) -> &mut Sentinel<L> {
        &mut self.sentinel
    }

    pub fn host(&self) -> &BufferedHost<R> {
        &self.host
    }

    pub fn into_parts(self) -> (Sentinel<L>, BufferedHost<R>) {
        (self.sentinel, self.host)
    }

    /// Run the first tick; later calls do nothing
    pub fn start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        self.host.timers_mut().set_now(now);
        self.sentinel.start(now, &mut self.host);
    }

    /// Apply one message at `now`
    pub fn dispatch(&mut self, message: HostMessage, now: Instant) {
        self.start(now);
        self.host.timers_mut().set_now(now);
        if let Some(signal) = self.host.apply(message) {
            trace!(signal = ?signal, "Dispatching signal");
            self.sentinel.handle_signal(signal, now, &mut self.host);
        }
    }

    /// Fire every timer due at `now`, earliest first
    ///
    /// Each timer fires with the clock set to its own deadline, so timers it
    /// arms are scheduled relative to when it was due. Returns the number of
    /// timers fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some((_, kind, deadline)) = self.host.timers_mut().pop_due(now) {
            self.host.timers_mut().set_now(deadline);
            self.sentinel.timer_fired(kind, deadline, &mut self.host);
            fired += 1;
        }
        self.host.timers_mut().set_now(now);
        fired
    }

    /// Cancel every armed timer
    pub fn stop(&mut self) {
        self.sentinel.stop(&mut self.host);
    }

    /// Drive the sentinel until the message channel closes or shutdown
    /// is signalled
    ///
    /// With a settle period, timers keep firing for that long after the
    /// channel closes so pending polls and reports still land.
    pub async fn run(
        mut self,
        mut messages: mpsc::Receiver<HostMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Self {
        info!("Starting sentinel loop");
        self.start(Instant::now());

        let mut settle_until: Option<Instant> = None;
        loop {
            let now = Instant::now();
            if settle_until.is_some_and(|until| now >= until) {
                debug!("Settle period elapsed");
                break;
            }

            let mut wake = self
                .host
                .timers()
                .next_deadline()
                .unwrap_or(now + IDLE_WAIT);
            if let Some(until) = settle_until {
                wake = wake.min(until);
            }

            tokio::select! {
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {
                    self.fire_due(Instant::now());
                }
                message = messages.recv(), if settle_until.is_none() => {
                    match message {
                        Some(message) => self.dispatch(message, Instant::now()),
                        None if self.settle.is_zero() => {
                            debug!("Host message channel closed");
                            break;
                        }
                        None => {
                            debug!(
                                settle_ms = self.settle.as_millis() as u64,
                                "Host message channel closed, settling timers"
                            );
                            settle_until = Some(Instant::now() + self.settle);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sentinel loop");
                    break;
                }
            }
        }

        self.stop();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::{RecordingRenderer, RenderOp};
    use crate::placement::Rect;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_host_message_wire_format() {
        let json = r#"[
            {"type": "entries", "entries": [
                {"name": "https://a.test/app.js", "entryType": "resource", "transferSize": 5000}
            ]},
            {"type": "signal", "signal": "content_loaded"},
            {"type": "layout", "elements": [
                {"id": 3, "tag": "img", "attributes": {"src": "/hero.jpg"},
                 "rect": {"width": 100.0, "height": 50.0}}
            ]}
        ]"#;
        let messages: Vec<HostMessage> = serde_json::from_str(json).unwrap();

        assert!(matches!(&messages[0], HostMessage::Entries { entries } if entries.len() == 1));
        assert_eq!(
            messages[1],
            HostMessage::Signal {
                signal: Signal::ContentLoaded
            }
        );
        match &messages[2] {
            HostMessage::Layout {
                device_pixel_ratio,
                elements,
            } => {
                assert_eq!(*device_pixel_ratio, 1.0);
                assert_eq!(elements[0].attributes["src"], "/hero.jpg");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_deadline_timers() {
        let t0 = Instant::now();
        let mut timers = DeadlineTimers::new(t0);

        let poll = timers.arm(TimerKind::Poll, ms(200));
        timers.arm(TimerKind::FootprintDebounce, ms(500));
        let late = timers.arm(TimerKind::Poll, ms(900));
        timers.cancel(late);
        timers.cancel(late);

        assert_eq!(timers.len(), 2);
        assert_eq!(timers.next_deadline(), Some(t0 + ms(200)));
        assert!(timers.pop_due(t0 + ms(199)).is_none());
        assert_eq!(
            timers.pop_due(t0 + ms(600)),
            Some((poll, TimerKind::Poll, t0 + ms(200)))
        );
        assert_eq!(
            timers.pop_due(t0 + ms(600)).map(|(_, kind, _)| kind),
            Some(TimerKind::FootprintDebounce)
        );
        assert!(timers.is_empty());
    }

    #[test]
    fn test_buffered_host_replaces_entries_by_name() {
        let mut host = BufferedHost::new(RecordingRenderer::default(), Instant::now());

        host.apply(HostMessage::Entries {
            entries: vec![
                TimingEntry::resource("https://a.test/a.js", 100.0, 0.0),
                TimingEntry::resource("https://a.test/b.js", 200.0, 0.0),
            ],
        });
        host.apply(HostMessage::Entries {
            entries: vec![TimingEntry::resource("https://a.test/a.js", 300.0, 0.0)],
        });

        assert_eq!(host.entries().len(), 2);
        assert_eq!(host.entries()[0].transfer_size, Some(300.0));
        assert_eq!(
            host.apply(HostMessage::Signal {
                signal: Signal::Scroll
            }),
            Some(Signal::Scroll)
        );
    }

    #[test]
    fn test_virtual_clock_drives_initial_footprint() {
        let t0 = Instant::now();
        let mut sentinel_loop = SentinelLoop::from_options(
            SentinelOptions::default(),
            (),
            RecordingRenderer::default(),
            t0,
        )
        .unwrap();

        sentinel_loop.dispatch(
            HostMessage::Layout {
                device_pixel_ratio: 2.0,
                elements: vec![RenderedElement::new(1, "img", Rect::new(50.0, 50.0))
                    .with_attribute("src", "https://a.test/hero.jpg")],
            },
            t0,
        );
        sentinel_loop.dispatch(
            HostMessage::Entries {
                entries: vec![TimingEntry::resource("https://a.test/hero.jpg", 300_000.0, 0.0)],
            },
            t0,
        );
        sentinel_loop.dispatch(
            HostMessage::Signal {
                signal: Signal::ContentLoaded,
            },
            t0 + ms(100),
        );

        let fired = sentinel_loop.fire_due(t0 + ms(1500));
        assert!(fired >= 5);

        let sentinel = sentinel_loop.sentinel();
        assert_eq!(sentinel.registry().initial_bytes(), Some(300_000));
        assert_eq!(sentinel.hints().len(), 1);
        // one poll, nothing else left outstanding after the debounce fired
        assert_eq!(sentinel_loop.host().timers().count(TimerKind::Poll), 1);
        assert_eq!(
            sentinel_loop.host().timers().count(TimerKind::FootprintDebounce),
            0
        );
        assert!(matches!(
            sentinel_loop.host().renderer().ops[0],
            RenderOp::Attach(_)
        ));
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let sentinel_loop = SentinelLoop::from_options(
            SentinelOptions::default(),
            (),
            RecordingRenderer::default(),
            Instant::now(),
        )
        .unwrap();
        let (tx, rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        tx.send(HostMessage::Entries {
            entries: vec![TimingEntry::resource("https://a.test/app.js", 64_000.0, 0.0)],
        })
        .await
        .unwrap();
        tx.send(HostMessage::Signal {
            signal: Signal::Scroll,
        })
        .await
        .unwrap();
        drop(tx);

        let sentinel_loop = sentinel_loop.run(rx, shutdown_rx).await;

        assert_eq!(sentinel_loop.sentinel().registry().total_bytes(), 64_000);
        assert!(sentinel_loop.host().timers().is_empty());
    }

    #[tokio::test]
    async fn test_run_settles_timers_after_channel_closes() {
        let mut options = SentinelOptions::default();
        options.schedule.warmup_interval_ms = 20;
        options.schedule.initial_footprint_delay_ms = 100;
        options.schedule.footprint_debounce_ms = 50;
        let sentinel_loop =
            SentinelLoop::from_options(options, (), RecordingRenderer::default(), Instant::now())
                .unwrap()
                .with_settle(ms(600));
        let (tx, rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        tx.send(HostMessage::Entries {
            entries: vec![TimingEntry::resource("https://a.test/app.js", 400_000.0, 0.0)],
        })
        .await
        .unwrap();
        tx.send(HostMessage::Signal {
            signal: Signal::ContentLoaded,
        })
        .await
        .unwrap();
        drop(tx);

        let sentinel_loop = sentinel_loop.run(rx, shutdown_rx).await;
        let sentinel = sentinel_loop.sentinel();

        assert_eq!(sentinel.registry().initial_bytes(), Some(400_000));
        assert_eq!(sentinel.footprint().last_delta.bytes, 0);
        assert!(sentinel_loop.host().timers().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sentinel_loop = SentinelLoop::from_options(
            SentinelOptions::default(),
            (),
            RecordingRenderer::default(),
            Instant::now(),
        )
        .unwrap();
        let (_tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(sentinel_loop.run(rx, shutdown_rx));
        shutdown_tx.send(()).unwrap();
        let sentinel_loop = handle.await.unwrap();

        assert!(sentinel_loop.host().timers().is_empty());
    }
}
