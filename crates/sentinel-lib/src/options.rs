//! Sentinel configuration
//!
//! Options are built once, validated, and then shared read-only behind an
//! `Arc` by the registry, every record and the facade.

use crate::error::{Result, SentinelError};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Predicate deciding whether a resource URL is ignored entirely
#[derive(Clone)]
pub struct ResourceFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ResourceFilter {
    /// Wrap a predicate returning `true` for URLs to skip
    pub fn new(skip: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(skip))
    }

    /// Filter that tracks everything
    pub fn allow_all() -> Self {
        Self::new(|_| false)
    }

    pub fn skips(&self, url: &str) -> bool {
        (self.0)(url)
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl fmt::Debug for ResourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResourceFilter(..)")
    }
}

/// Timing of the polling and notification machinery
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Poll interval before the initial footprint is captured
    pub warmup_interval_ms: u64,
    /// Poll interval afterwards
    pub steady_interval_ms: u64,
    /// Delay after load-complete before the initial footprint is frozen
    pub initial_footprint_delay_ms: u64,
    /// Resets closer together than this collapse into one tick
    pub reset_coalesce_ms: u64,
    /// Quiet period before a footprint change is reported
    pub footprint_debounce_ms: u64,
    /// Minimum growth before a footprint change is reported
    pub min_footprint_delta_bytes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup_interval_ms: 200,
            steady_interval_ms: 2000,
            initial_footprint_delay_ms: 1000,
            reset_coalesce_ms: 200,
            footprint_debounce_ms: 500,
            min_footprint_delta_bytes: 100 * 1024,
        }
    }
}

impl ScheduleConfig {
    pub fn warmup_interval(&self) -> Duration {
        Duration::from_millis(self.warmup_interval_ms)
    }

    pub fn steady_interval(&self) -> Duration {
        Duration::from_millis(self.steady_interval_ms)
    }

    pub fn initial_footprint_delay(&self) -> Duration {
        Duration::from_millis(self.initial_footprint_delay_ms)
    }

    pub fn reset_coalesce(&self) -> Duration {
        Duration::from_millis(self.reset_coalesce_ms)
    }

    pub fn footprint_debounce(&self) -> Duration {
        Duration::from_millis(self.footprint_debounce_ms)
    }
}

/// Sentinel options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SentinelOptions {
    /// Master switch; an inactive sentinel ignores every signal
    pub is_activated: bool,
    /// Expose summary data for the footprint widget
    pub show_summary: bool,
    /// Attach hints to oversized elements
    pub show_resource_hints: bool,
    /// Byte budget per 100x100 physical pixels of rendered area
    pub max_bytes_per_100x100_threshold: u64,
    /// Hard cap for a single resource regardless of its area
    pub max_bytes_per_resource_threshold: u64,
    /// Resources below this size never get hints
    pub ignore_resources_below_bytes_threshold: u64,
    /// URLs containing any of these substrings are not tracked
    pub skip_url_patterns: Vec<String>,
    /// Additional programmatic skip predicate
    #[serde(skip)]
    pub skip_resource: ResourceFilter,
    pub schedule: ScheduleConfig,
}

impl Default for SentinelOptions {
    fn default() -> Self {
        Self {
            is_activated: true,
            show_summary: true,
            show_resource_hints: true,
            max_bytes_per_100x100_threshold: 10 * 1024,
            max_bytes_per_resource_threshold: 200 * 1024,
            ignore_resources_below_bytes_threshold: 40 * 1024,
            skip_url_patterns: Vec::new(),
            skip_resource: ResourceFilter::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl SentinelOptions {
    /// Replace the skip predicate
    pub fn with_skip_resource(mut self, filter: ResourceFilter) -> Self {
        self.skip_resource = filter;
        self
    }

    /// Whether a URL is excluded from tracking
    pub fn skips(&self, url: &str) -> bool {
        self.skip_url_patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && url.contains(pattern.as_str()))
            || self.skip_resource.skips(url)
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        let schedule = &self.schedule;
        if schedule.warmup_interval_ms == 0 || schedule.steady_interval_ms == 0 {
            return Err(SentinelError::Config(
                "poll intervals must be greater than zero".to_string(),
            ));
        }
        if schedule.footprint_debounce_ms == 0 {
            return Err(SentinelError::Config(
                "footprint debounce must be greater than zero".to_string(),
            ));
        }
        if self.max_bytes_per_100x100_threshold == 0 || self.max_bytes_per_resource_threshold == 0
        {
            return Err(SentinelError::Config(
                "byte thresholds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and freeze for sharing
    pub fn into_shared(self) -> Result<Arc<Self>> {
        self.validate()?;
        Ok(Arc::new(self))
    }
}
