//! Replay a recorded host trace
//!
//! The trace is a JSON array of `{ "at_ms": .., "message": .. }` steps. Steps
//! are applied on a virtual clock, with every timer that falls due between
//! two steps fired at its own deadline, so a replay is deterministic and
//! takes no wall time.

use anyhow::{Context, Result};
use colored::Colorize;
use prometheus::{Encoder, TextEncoder};
use sentinel_lib::format::format_bytes;
use sentinel_lib::hints::{Hint, RecordingRenderer};
use sentinel_lib::runtime::{HostMessage, SentinelLoop};
use sentinel_lib::{
    FootprintListener, FootprintResult, FootprintSummary, ResourceRecord, SentinelOptions,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tabled::Tabled;
use tracing::info;

use crate::output::{
    color_rating, print_info, print_json, print_success, print_table, print_warning, OutputFormat,
};

/// One recorded host message
#[derive(Debug, Clone, Deserialize)]
pub struct TraceStep {
    pub at_ms: u64,
    pub message: HostMessage,
}

/// Footprint milestone seen during the replay
#[derive(Debug, Clone, Serialize)]
pub struct FootprintEvent {
    pub kind: &'static str,
    pub footprint: FootprintResult,
}

#[derive(Default)]
struct ReplayListener {
    events: Vec<FootprintEvent>,
}

impl FootprintListener for ReplayListener {
    fn on_initial_footprint(&mut self, footprint: &FootprintResult) {
        self.events.push(FootprintEvent {
            kind: "initial",
            footprint: footprint.clone(),
        });
    }

    fn on_footprint_change(&mut self, footprint: &FootprintResult) {
        self.events.push(FootprintEvent {
            kind: "change",
            footprint: footprint.clone(),
        });
    }
}

/// Tracked resource in the report
#[derive(Debug, Clone, Serialize)]
pub struct ResourceEntry {
    pub url: String,
    pub size_bytes: u64,
}

impl From<&ResourceRecord> for ResourceEntry {
    fn from(record: &ResourceRecord) -> Self {
        Self {
            url: record.url().to_string(),
            size_bytes: record.size_bytes(),
        }
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub duration_ms: u64,
    pub resources: Vec<ResourceEntry>,
    pub hints: Vec<Hint>,
    pub render_ops: usize,
    pub events: Vec<FootprintEvent>,
    pub footprint: FootprintResult,
    pub summary: Option<FootprintSummary>,
}

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    url: String,
    #[tabled(rename = "Size")]
    size: String,
}

#[derive(Tabled)]
struct HintRow {
    #[tabled(rename = "Element")]
    anchor: u64,
    #[tabled(rename = "Resource")]
    url: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Budget")]
    budget: String,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Event")]
    kind: &'static str,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "Delta")]
    delta: String,
}

/// Read a trace file
pub fn load_trace(path: &Path) -> Result<Vec<TraceStep>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trace {}", path.display()))
}

/// Replay `steps` and let timers run for `settle` after the last one
pub fn run_trace(
    mut steps: Vec<TraceStep>,
    options: SentinelOptions,
    settle: Duration,
) -> Result<ReplayReport> {
    steps.sort_by_key(|step| step.at_ms);

    let t0 = Instant::now();
    let mut sentinel_loop = SentinelLoop::from_options(
        options,
        ReplayListener::default(),
        RecordingRenderer::default(),
        t0,
    )?;
    sentinel_loop.start(t0);

    let mut last_ms = 0;
    for step in steps {
        let at = t0 + Duration::from_millis(step.at_ms);
        sentinel_loop.fire_due(at);
        sentinel_loop.dispatch(step.message, at);
        last_ms = step.at_ms;
    }

    let end = t0 + Duration::from_millis(last_ms) + settle;
    let fired = sentinel_loop.fire_due(end);
    sentinel_loop.stop();
    info!(steps_end_ms = last_ms, settle_timers = fired, "Replay finished");

    let (sentinel, host) = sentinel_loop.into_parts();

    let mut resources: Vec<ResourceEntry> =
        sentinel.registry().records().map(ResourceEntry::from).collect();
    resources.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then(a.url.cmp(&b.url)));

    Ok(ReplayReport {
        duration_ms: end.duration_since(t0).as_millis() as u64,
        resources,
        hints: sentinel.hints().sorted().into_iter().cloned().collect(),
        render_ops: host.renderer().ops.len(),
        events: sentinel.listener().events.clone(),
        footprint: sentinel.footprint(),
        summary: sentinel.summary(),
    })
}

/// `replay` subcommand
pub fn replay(
    path: &Path,
    settle_ms: u64,
    options: SentinelOptions,
    show_metrics: bool,
    format: OutputFormat,
) -> Result<()> {
    let steps = load_trace(path)?;
    let report = run_trace(steps, options, Duration::from_millis(settle_ms))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }

    if show_metrics {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        eprint!("{}", String::from_utf8_lossy(&buffer));
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    println!("{}", "Resources".bold());
    let rows: Vec<ResourceRow> = report
        .resources
        .iter()
        .map(|r| ResourceRow {
            url: r.url.clone(),
            size: format_bytes(r.size_bytes),
        })
        .collect();
    print_table(&rows, "No resources tracked");
    println!();

    println!("{}", "Oversized resources".bold());
    let rows: Vec<HintRow> = report
        .hints
        .iter()
        .map(|h| HintRow {
            anchor: h.key.anchor.0,
            url: h.key.url.clone(),
            size: h.size_label.clone(),
            budget: h.budget_label.clone(),
        })
        .collect();
    if rows.is_empty() {
        print_success("No oversized resources");
    } else {
        print_table(&rows, "No oversized resources");
    }
    println!();

    println!("{}", "Footprint events".bold());
    let rows: Vec<EventRow> = report
        .events
        .iter()
        .map(|e| EventRow {
            kind: e.kind,
            total: e.footprint.total.bytes_formatted.clone(),
            rating: color_rating(e.footprint.total.rating, e.footprint.total.rating.label())
                .to_string(),
            delta: e.footprint.last_delta.bytes_formatted.clone(),
        })
        .collect();
    print_table(&rows, "No footprint events");
    println!();

    let total = &report.footprint.total;
    println!(
        "{} {} {}",
        "Total:".bold(),
        color_rating(total.rating, total.rating.label()),
        total.bytes_formatted
    );
    match report.summary.as_ref().and_then(|s| s.initial.as_ref()) {
        Some(initial) => print_info(&format!(
            "Initial footprint {} ({})",
            initial.bytes_formatted, initial.rating
        )),
        None => print_warning("Initial footprint not captured, was content_loaded signalled?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_lib::placement::{Rect, RenderedElement};
    use sentinel_lib::{Rating, Signal, TimingEntry};

    fn step(at_ms: u64, message: HostMessage) -> TraceStep {
        TraceStep { at_ms, message }
    }

    fn page_trace() -> Vec<TraceStep> {
        vec![
            step(
                0,
                HostMessage::Layout {
                    device_pixel_ratio: 1.0,
                    elements: vec![RenderedElement::new(1, "img", Rect::new(100.0, 100.0))
                        .with_attribute("src", "/hero.jpg")],
                },
            ),
            step(
                50,
                HostMessage::Entries {
                    entries: vec![
                        TimingEntry::navigation("https://a.test/", 30_000.0, 0.0),
                        TimingEntry::resource("https://a.test/hero.jpg", 600_000.0, 0.0),
                    ],
                },
            ),
            step(
                400,
                HostMessage::Signal {
                    signal: Signal::ContentLoaded,
                },
            ),
        ]
    }

    #[test]
    fn test_replay_page_load() {
        let report =
            run_trace(page_trace(), SentinelOptions::default(), Duration::from_secs(3)).unwrap();

        assert_eq!(report.duration_ms, 3400);
        assert_eq!(report.resources.len(), 2);
        assert_eq!(report.resources[0].url, "https://a.test/hero.jpg");
        assert_eq!(report.hints.len(), 1);
        assert_eq!(report.footprint.total.bytes, 630_000);
        assert_eq!(report.footprint.total.rating, Rating::B);

        let kinds: Vec<&str> = report.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["change", "initial"]);
        let summary = report.summary.unwrap();
        assert_eq!(summary.initial.unwrap().bytes, 630_000);
    }

    #[test]
    fn test_unordered_steps_are_sorted() {
        let mut steps = page_trace();
        steps.reverse();

        let report = run_trace(steps, SentinelOptions::default(), Duration::from_secs(3)).unwrap();
        assert_eq!(report.footprint.total.bytes, 630_000);
    }

    #[test]
    fn test_trace_file_format() {
        let json = r#"[
            {"at_ms": 0, "message": {"type": "entries", "entries": [
                {"name": "https://a.test/app.js", "entryType": "resource", "transferSize": 1024}
            ]}},
            {"at_ms": 10, "message": {"type": "signal", "signal": "resize"}}
        ]"#;
        let steps: Vec<TraceStep> = serde_json::from_str(json).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].at_ms, 10);
    }
}
