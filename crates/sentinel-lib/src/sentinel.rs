//! Sentinel facade
//!
//! [`Sentinel`] ties the registry, hint board and footprint debouncer
//! together and is what a host drives. The host provides timing entries,
//! timers, the laid-out document and hint rendering through one value
//! implementing [`SentinelHost`].

use crate::error::Result;
use crate::format::size_factor;
use crate::hints::{find_elements_with_url, HintBoard, HintChange, HintRenderer};
use crate::models::{FootprintResult, FootprintSummary, TotalFootprint};
use crate::notify::FootprintDebouncer;
use crate::observability::{SentinelMetrics, StructuredLogger};
use crate::options::SentinelOptions;
use crate::placement::RenderedElement;
use crate::registry::{
    Phase, RegistryEvent, ResourceRegistry, Signal, TickReport, TimerDriver, TimerKind,
    TimingSource, Trigger,
};
use crate::resource::{HintOutcome, ResourceRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Largest scale factor of the summary bars
pub const SUMMARY_MAX_SIZE_FACTOR: f64 = 8.0;

/// Read access to the laid-out document
pub trait DocumentView {
    fn device_pixel_ratio(&self) -> f64;
    /// Every element currently in the document
    fn elements(&self) -> Vec<RenderedElement>;
}

/// Callbacks for footprint milestones; every method defaults to a no-op
pub trait FootprintListener {
    fn on_resource_updated(&mut self, _record: &ResourceRecord) {}
    fn on_initial_footprint(&mut self, _footprint: &FootprintResult) {}
    fn on_footprint_change(&mut self, _footprint: &FootprintResult) {}
}

impl FootprintListener for () {}

/// Everything a host provides to a sentinel
pub trait SentinelHost: TimingSource + TimerDriver + DocumentView + HintRenderer {}

impl<T> SentinelHost for T where T: TimingSource + TimerDriver + DocumentView + HintRenderer {}

/// Page footprint tracker
pub struct Sentinel<L: FootprintListener> {
    options: Arc<SentinelOptions>,
    registry: ResourceRegistry,
    hints: HintBoard,
    debouncer: FootprintDebouncer,
    listener: L,
    metrics: SentinelMetrics,
    logger: StructuredLogger,
}

impl<L: FootprintListener> Sentinel<L> {
    /// Validate `options` and build a sentinel reporting to `listener`
    pub fn new(options: SentinelOptions, listener: L) -> Result<Self> {
        let options = options.into_shared()?;
        Ok(Self {
            registry: ResourceRegistry::new(Arc::clone(&options)),
            hints: HintBoard::new(),
            debouncer: FootprintDebouncer::new(&options.schedule),
            listener,
            metrics: SentinelMetrics::new(),
            logger: StructuredLogger::new("document"),
            options,
        })
    }

    /// Replace the default structured logger, e.g. to tag events with the page URL
    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn is_active(&self) -> bool {
        self.options.is_activated
    }

    pub fn options(&self) -> &Arc<SentinelOptions> {
        &self.options
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn hints(&self) -> &HintBoard {
        &self.hints
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Run the first tick and start polling
    pub fn start<H: SentinelHost>(&mut self, now: Instant, host: &mut H) -> Option<TickReport> {
        if !self.is_active() {
            debug!("Sentinel inactive, not starting");
            return None;
        }
        self.logger
            .log_startup(env!("CARGO_PKG_VERSION"), self.options.show_resource_hints);
        Some(self.run_tick(Trigger::Poll, now, host))
    }

    /// Route a document signal
    pub fn handle_signal<H: SentinelHost>(
        &mut self,
        signal: Signal,
        now: Instant,
        host: &mut H,
    ) -> Option<TickReport> {
        if !self.is_active() {
            return None;
        }
        let started = Instant::now();
        let report = self.registry.handle_signal(signal, now, host);
        self.after_tick(&report, started, host);
        Some(report)
    }

    /// Route an expired timer
    pub fn timer_fired<H: SentinelHost>(
        &mut self,
        kind: TimerKind,
        now: Instant,
        host: &mut H,
    ) -> Option<TickReport> {
        if !self.is_active() {
            return None;
        }
        match kind {
            TimerKind::Poll => Some(self.run_tick(Trigger::Poll, now, host)),
            TimerKind::FootprintDebounce => {
                if let Some(result) = self.debouncer.fire(self.registry.total_bytes()) {
                    self.logger.log_footprint_change(&result);
                    self.listener.on_footprint_change(&result);
                }
                None
            }
        }
    }

    /// Cancel every armed timer
    pub fn stop<H: SentinelHost>(&mut self, host: &mut H) {
        self.registry.cancel(host);
        self.debouncer.cancel(host);
    }

    /// Current footprint relative to the last reported change
    pub fn footprint(&self) -> FootprintResult {
        FootprintResult::new(self.registry.total_bytes(), self.debouncer.last_reported())
    }

    /// Data for the summary widget, if enabled
    pub fn summary(&self) -> Option<FootprintSummary> {
        if !self.options.show_summary {
            return None;
        }

        let total_bytes = self.registry.total_bytes();
        let initial_bytes = self.registry.initial_bytes();
        let show_initial = matches!(initial_bytes, Some(b) if b != 0 && b != total_bytes);

        Some(FootprintSummary {
            total: TotalFootprint::from_bytes(total_bytes),
            initial: initial_bytes.map(TotalFootprint::from_bytes),
            show_initial,
            hint_count: if self.options.show_resource_hints {
                self.hints.len()
            } else {
                0
            },
            total_size_factor: size_factor(total_bytes, SUMMARY_MAX_SIZE_FACTOR),
            initial_size_factor: size_factor(initial_bytes.unwrap_or(0), SUMMARY_MAX_SIZE_FACTOR),
        })
    }

    fn run_tick<H: SentinelHost>(
        &mut self,
        trigger: Trigger,
        now: Instant,
        host: &mut H,
    ) -> TickReport {
        let started = Instant::now();
        let report = self.registry.tick(trigger, now, host);
        self.after_tick(&report, started, host);
        report
    }

    fn after_tick<H: SentinelHost>(
        &mut self,
        report: &TickReport,
        started: Instant,
        host: &mut H,
    ) {
        for event in &report.events {
            match event {
                RegistryEvent::ResourceUpdated { url, .. } => self.resource_updated(url, host),
                RegistryEvent::InitialFootprint { bytes } => {
                    let footprint = self.footprint();
                    self.metrics.set_initial_bytes(*bytes);
                    self.logger.log_phase_change(Phase::Warmup, Phase::Steady);
                    self.logger
                        .log_initial_footprint(&footprint, self.registry.len());
                    self.listener.on_initial_footprint(&footprint);
                }
            }
        }

        self.metrics
            .observe_tick(report, started.elapsed().as_secs_f64());
        self.metrics
            .set_footprint(self.registry.total_bytes(), self.registry.len());
        self.metrics.set_hints_active(self.hints.len());
    }

    fn resource_updated<H: SentinelHost>(&mut self, url: &str, host: &mut H) {
        let Some(record) = self.registry.get(url) else {
            return;
        };
        self.listener.on_resource_updated(record);

        if self.options.show_resource_hints
            && record.size_bytes() >= self.options.ignore_resources_below_bytes_threshold
        {
            let elements = host.elements();
            let dpr = host.device_pixel_ratio();
            for element in find_elements_with_url(&elements, url) {
                let outcome = record.evaluate_hint(element, dpr, &mut self.hints, &mut *host);
                if let HintOutcome::OverBudget {
                    budget_bytes,
                    change: HintChange::Attached,
                    ..
                } = outcome
                {
                    self.logger
                        .log_hint_attached(url, element.id.0, record.size_bytes(), budget_bytes);
                }
            }
        }

        self.debouncer.touch(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hints::{Hint, HintKey, RenderOp};
    use crate::models::TimingEntry;
    use crate::placement::Rect;
    use crate::registry::TimerHandle;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[derive(Default)]
    struct TestHost {
        entries: Vec<TimingEntry>,
        elements: Vec<RenderedElement>,
        next: u64,
        timers: BTreeMap<TimerHandle, TimerKind>,
        ops: Vec<RenderOp>,
    }

    impl TimingSource for TestHost {
        fn timing_entries(&self) -> Vec<TimingEntry> {
            self.entries.clone()
        }
    }

    impl TimerDriver for TestHost {
        fn arm(&mut self, kind: TimerKind, _delay: Duration) -> TimerHandle {
            self.next += 1;
            self.timers.insert(TimerHandle(self.next), kind);
            TimerHandle(self.next)
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.timers.remove(&handle);
        }
    }

    impl DocumentView for TestHost {
        fn device_pixel_ratio(&self) -> f64 {
            1.0
        }

        fn elements(&self) -> Vec<RenderedElement> {
            self.elements.clone()
        }
    }

    impl HintRenderer for TestHost {
        fn attach(&mut self, hint: &Hint) {
            self.ops.push(RenderOp::Attach(hint.clone()));
        }

        fn update(&mut self, hint: &Hint) {
            self.ops.push(RenderOp::Update(hint.clone()));
        }

        fn remove(&mut self, key: &HintKey) {
            self.ops.push(RenderOp::Remove(key.clone()));
        }
    }

    #[derive(Default)]
    struct Recorder {
        updated: Vec<String>,
        initial: Vec<FootprintResult>,
        changes: Vec<FootprintResult>,
    }

    impl FootprintListener for Recorder {
        fn on_resource_updated(&mut self, record: &ResourceRecord) {
            self.updated.push(record.url().to_string());
        }

        fn on_initial_footprint(&mut self, footprint: &FootprintResult) {
            self.initial.push(footprint.clone());
        }

        fn on_footprint_change(&mut self, footprint: &FootprintResult) {
            self.changes.push(footprint.clone());
        }
    }

    const HERO: &str = "https://a.test/img/hero.jpg";

    fn page() -> TestHost {
        TestHost {
            entries: vec![
                TimingEntry::navigation("https://a.test/", 20_000.0, 0.0),
                TimingEntry::resource(HERO, 1000.0 * 1024.0, 0.0),
            ],
            elements: vec![RenderedElement::new(7, "img", Rect::new(100.0, 100.0))
                .with_attribute("src", "/img/hero.jpg")],
            ..Default::default()
        }
    }

    fn armed(host: &TestHost, kind: TimerKind) -> usize {
        host.timers.values().filter(|k| **k == kind).count()
    }

    #[test]
    fn test_start_tracks_and_hints() {
        let mut host = page();
        let mut sentinel = Sentinel::new(SentinelOptions::default(), Recorder::default()).unwrap();

        let report = sentinel.start(Instant::now(), &mut host).unwrap();

        assert_eq!(report.events.len(), 2);
        assert_eq!(sentinel.listener().updated.len(), 2);
        assert_eq!(sentinel.hints().len(), 1);
        assert!(matches!(&host.ops[0], RenderOp::Attach(hint) if hint.key.anchor.0 == 7));
        assert_eq!(armed(&host, TimerKind::Poll), 1);
        assert_eq!(armed(&host, TimerKind::FootprintDebounce), 1);
    }

    #[test]
    fn test_inactive_sentinel_ignores_everything() {
        let options = SentinelOptions {
            is_activated: false,
            ..Default::default()
        };
        let mut host = page();
        let mut sentinel = Sentinel::new(options, Recorder::default()).unwrap();
        let now = Instant::now();

        assert!(sentinel.start(now, &mut host).is_none());
        assert!(sentinel
            .handle_signal(Signal::ContentLoaded, now, &mut host)
            .is_none());
        assert!(sentinel.timer_fired(TimerKind::Poll, now, &mut host).is_none());
        assert!(sentinel.registry().is_empty());
        assert!(host.timers.is_empty());
    }

    #[test]
    fn test_hints_disabled() {
        let options = SentinelOptions {
            show_resource_hints: false,
            ..Default::default()
        };
        let mut host = page();
        let mut sentinel = Sentinel::new(options, ()).unwrap();

        sentinel.start(Instant::now(), &mut host);

        assert!(host.ops.is_empty());
        assert_eq!(sentinel.summary().unwrap().hint_count, 0);
    }

    #[test]
    fn test_initial_footprint_reaches_listener() {
        let mut host = page();
        let mut sentinel = Sentinel::new(SentinelOptions::default(), Recorder::default()).unwrap();
        let t0 = Instant::now();

        sentinel.start(t0, &mut host);
        sentinel.handle_signal(Signal::ContentLoaded, t0, &mut host);
        sentinel.timer_fired(TimerKind::Poll, t0 + Duration::from_millis(1000), &mut host);

        let initial = &sentinel.listener().initial;
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].total.bytes, 20_000 + 1000 * 1024);
        assert_eq!(sentinel.registry().phase(), Phase::Steady);
    }

    #[test]
    fn test_debounced_change_report() {
        let mut host = page();
        let mut sentinel = Sentinel::new(SentinelOptions::default(), Recorder::default()).unwrap();
        let t0 = Instant::now();
        sentinel.start(t0, &mut host);

        sentinel.timer_fired(TimerKind::FootprintDebounce, t0, &mut host);
        assert_eq!(sentinel.listener().changes.len(), 1);
        assert_eq!(sentinel.footprint().last_delta.bytes, 0);

        // small growth is swallowed
        host.entries
            .push(TimingEntry::resource("https://a.test/small.js", 2048.0, 0.0));
        sentinel.timer_fired(TimerKind::Poll, t0, &mut host);
        sentinel.timer_fired(TimerKind::FootprintDebounce, t0, &mut host);
        assert_eq!(sentinel.listener().changes.len(), 1);
        assert_eq!(sentinel.footprint().last_delta.bytes, 2048);
    }

    #[test]
    fn test_summary() {
        let mut host = page();
        let mut sentinel = Sentinel::new(SentinelOptions::default(), ()).unwrap();
        let t0 = Instant::now();

        sentinel.start(t0, &mut host);
        let summary = sentinel.summary().unwrap();
        assert!(summary.initial.is_none());
        assert!(!summary.show_initial);
        assert_eq!(summary.hint_count, 1);
        assert!(summary.total_size_factor > 1.0);
        assert_eq!(summary.initial_size_factor, 1.0);

        sentinel.handle_signal(Signal::ContentLoaded, t0, &mut host);
        sentinel.timer_fired(TimerKind::Poll, t0 + Duration::from_secs(2), &mut host);
        assert!(!sentinel.summary().unwrap().show_initial);

        host.entries
            .push(TimingEntry::resource("https://a.test/lazy.js", 4096.0, 0.0));
        sentinel.timer_fired(TimerKind::Poll, t0 + Duration::from_secs(4), &mut host);
        assert!(sentinel.summary().unwrap().show_initial);
    }

    #[test]
    fn test_summary_disabled() {
        let options = SentinelOptions {
            show_summary: false,
            ..Default::default()
        };
        let sentinel = Sentinel::new(options, ()).unwrap();
        assert!(sentinel.summary().is_none());
    }

    #[test]
    fn test_stop_cancels_timers() {
        let mut host = page();
        let mut sentinel = Sentinel::new(SentinelOptions::default(), ()).unwrap();

        sentinel.start(Instant::now(), &mut host);
        sentinel.stop(&mut host);

        assert!(host.timers.is_empty());
    }
}
