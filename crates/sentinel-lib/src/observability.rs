//! Observability infrastructure for the sentinel
//!
//! Provides:
//! - Prometheus metrics (footprint totals, tracked resources, tick latency)
//! - Structured JSON logging with tracing

use crate::models::FootprintResult;
use crate::rating::Rating;
use crate::registry::{Phase, TickReport};
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for tick latency (in seconds)
const TICK_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
///
/// Holds `None` when registration failed, e.g. because another registry user
/// already took the metric names. Metrics then become no-ops.
static GLOBAL_METRICS: OnceLock<Option<SentinelMetricsInner>> = OnceLock::new();

struct SentinelMetricsInner {
    total_bytes: IntGauge,
    initial_bytes: IntGauge,
    resources_tracked: IntGauge,
    hints_active: IntGauge,
    ticks_total: IntCounter,
    entries_skipped_total: IntCounter,
    tick_duration_seconds: Histogram,
}

impl SentinelMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            total_bytes: register_int_gauge!(
                "footprint_sentinel_total_bytes",
                "Current transfer footprint of the page in bytes"
            )?,
            initial_bytes: register_int_gauge!(
                "footprint_sentinel_initial_bytes",
                "Footprint frozen shortly after load-complete"
            )?,
            resources_tracked: register_int_gauge!(
                "footprint_sentinel_resources_tracked",
                "Number of distinct resources tracked"
            )?,
            hints_active: register_int_gauge!(
                "footprint_sentinel_hints_active",
                "Number of oversize hints currently shown"
            )?,
            ticks_total: register_int_counter!(
                "footprint_sentinel_ticks_total",
                "Total number of registry ticks that enumerated timing entries"
            )?,
            entries_skipped_total: register_int_counter!(
                "footprint_sentinel_entries_skipped_total",
                "Total number of malformed timing entries skipped"
            )?,
            tick_duration_seconds: register_histogram!(
                "footprint_sentinel_tick_duration_seconds",
                "Time spent in one registry tick",
                TICK_BUCKETS.to_vec()
            )?,
        })
    }
}

/// Sentinel metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Multiple clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct SentinelMetrics {
    inner: Option<&'static SentinelMetricsInner>,
}

impl Default for SentinelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SentinelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentinelMetrics")
            .field("registered", &self.inner.is_some())
            .finish()
    }
}

impl SentinelMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        let inner = GLOBAL_METRICS.get_or_init(|| match SentinelMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register sentinel metrics");
                None
            }
        });
        Self {
            inner: inner.as_ref(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.inner.is_some()
    }

    /// Record the outcome of a tick
    pub fn observe_tick(&self, report: &TickReport, duration_secs: f64) {
        let Some(inner) = self.inner else { return };
        if report.coalesced {
            return;
        }
        inner.ticks_total.inc();
        inner
            .entries_skipped_total
            .inc_by(report.entries_skipped as u64);
        inner.tick_duration_seconds.observe(duration_secs);
    }

    /// Update footprint gauges
    pub fn set_footprint(&self, total_bytes: u64, resources: usize) {
        if let Some(inner) = self.inner {
            inner.total_bytes.set(clamp_i64(total_bytes));
            inner.resources_tracked.set(resources as i64);
        }
    }

    pub fn set_initial_bytes(&self, bytes: u64) {
        if let Some(inner) = self.inner {
            inner.initial_bytes.set(clamp_i64(bytes));
        }
    }

    pub fn set_hints_active(&self, count: usize) {
        if let Some(inner) = self.inner {
            inner.hints_active.set(count as i64);
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Structured logger for sentinel events
///
/// Provides consistent JSON-formatted logging for footprint milestones and
/// hint activity.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    page: String,
}

impl StructuredLogger {
    pub fn new(page: impl Into<String>) -> Self {
        Self { page: page.into() }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Log sentinel startup
    pub fn log_startup(&self, version: &str, hints_enabled: bool) {
        info!(
            event = "sentinel_started",
            page = %self.page,
            version = %version,
            hints_enabled = hints_enabled,
            "Footprint sentinel started"
        );
    }

    /// Log the frozen initial footprint
    pub fn log_initial_footprint(&self, result: &FootprintResult, resources: usize) {
        info!(
            event = "initial_footprint",
            page = %self.page,
            bytes = result.total.bytes,
            formatted = %result.total.bytes_formatted,
            rating = %result.total.rating,
            resources = resources,
            "Initial footprint captured"
        );
    }

    /// Log a reported footprint change
    ///
    /// Changes that drop the page into the worst ratings are logged as
    /// warnings.
    pub fn log_footprint_change(&self, result: &FootprintResult) {
        if result.total.rating >= Rating::E {
            warn!(
                event = "footprint_changed",
                page = %self.page,
                bytes = result.total.bytes,
                delta_bytes = result.last_delta.bytes,
                delta = %result.last_delta.bytes_formatted,
                rating = %result.total.rating,
                "Page footprint grew into a poor rating"
            );
        } else {
            info!(
                event = "footprint_changed",
                page = %self.page,
                bytes = result.total.bytes,
                delta_bytes = result.last_delta.bytes,
                delta = %result.last_delta.bytes_formatted,
                rating = %result.total.rating,
                "Page footprint changed"
            );
        }
    }

    /// Log a newly attached oversize hint
    pub fn log_hint_attached(&self, url: &str, anchor: u64, size_bytes: u64, budget_bytes: u64) {
        info!(
            event = "hint_attached",
            page = %self.page,
            url = %url,
            anchor = anchor,
            size_bytes = size_bytes,
            budget_bytes = budget_bytes,
            "Oversized resource hint attached"
        );
    }

    /// Log a polling phase switch
    pub fn log_phase_change(&self, from: Phase, to: Phase) {
        info!(
            event = "phase_changed",
            page = %self.page,
            from = ?from,
            to = ?to,
            "Polling phase changed"
        );
    }
}
