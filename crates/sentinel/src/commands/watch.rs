//! Watch a live host message stream
//!
//! Reads [`HostMessage`]s as JSON lines from stdin and writes one JSON event
//! per line to stdout until Ctrl-C is pressed, or until stdin closes and the
//! settle period has passed, so a piped session still sees the footprint
//! reports its timers were about to make.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sentinel_lib::hints::{Hint, HintKey, HintRenderer, RenderOp};
use sentinel_lib::runtime::{HostMessage, SentinelLoop};
use sentinel_lib::{
    FootprintListener, FootprintResult, FootprintSummary, ResourceRecord, SentinelOptions,
};
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Capacity of the stdin to loop channel
const MESSAGE_BUFFER: usize = 256;

/// Event written to stdout
#[derive(Debug, Serialize)]
pub struct WatchEvent<'a> {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: WatchPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchPayload<'a> {
    ResourceUpdated {
        url: &'a str,
        size_bytes: u64,
    },
    InitialFootprint { footprint: &'a FootprintResult },
    FootprintChanged { footprint: &'a FootprintResult },
    Hint { render: RenderOp },
    Summary {
        footprint: FootprintResult,
        summary: Option<FootprintSummary>,
    },
}

fn emit(payload: WatchPayload<'_>) {
    let event = WatchEvent {
        timestamp: Utc::now(),
        payload,
    };
    match serde_json::to_string(&event) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
                warn!(error = %e, "Failed to write event");
            }
        }
        Err(e) => warn!(error = %e, "Failed to serialize event"),
    }
}

/// Listener writing footprint milestones to stdout
struct JsonLinesListener;

impl FootprintListener for JsonLinesListener {
    fn on_resource_updated(&mut self, record: &ResourceRecord) {
        emit(WatchPayload::ResourceUpdated {
            url: record.url(),
            size_bytes: record.size_bytes(),
        });
    }

    fn on_initial_footprint(&mut self, footprint: &FootprintResult) {
        emit(WatchPayload::InitialFootprint { footprint });
    }

    fn on_footprint_change(&mut self, footprint: &FootprintResult) {
        emit(WatchPayload::FootprintChanged { footprint });
    }
}

/// Renderer writing hint operations to stdout
struct JsonLinesRenderer;

impl HintRenderer for JsonLinesRenderer {
    fn attach(&mut self, hint: &Hint) {
        emit(WatchPayload::Hint {
            render: RenderOp::Attach(hint.clone()),
        });
    }

    fn update(&mut self, hint: &Hint) {
        emit(WatchPayload::Hint {
            render: RenderOp::Update(hint.clone()),
        });
    }

    fn remove(&mut self, key: &HintKey) {
        emit(WatchPayload::Hint {
            render: RenderOp::Remove(key.clone()),
        });
    }
}

/// Parse one stdin line; blank lines yield nothing
pub fn parse_line(line: &str) -> Result<Option<HostMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// `watch` subcommand
pub async fn watch(options: SentinelOptions, settle: Duration) -> Result<()> {
    let sentinel_loop =
        SentinelLoop::from_options(options, JsonLinesListener, JsonLinesRenderer, Instant::now())?
            .with_settle(settle);

    let (message_tx, message_rx) = mpsc::channel(MESSAGE_BUFFER);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_no = 0u64;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            line_no += 1;
            match parse_line(&line) {
                Ok(Some(message)) => {
                    if message_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(line = line_no, error = %e, "Skipping malformed host message"),
            }
        }
    });

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = shutdown_tx.send(());
        }
    });

    let sentinel_loop = sentinel_loop.run(message_rx, shutdown_rx).await;
    reader.abort();
    ctrl_c.abort();

    let sentinel = sentinel_loop.sentinel();
    emit(WatchPayload::Summary {
        footprint: sentinel.footprint(),
        summary: sentinel.summary(),
    });
    Ok(())
}
