//! Footprint tracking library for web pages
//!
//! This crate provides the core functionality for:
//! - Tracking the transfer size of every resource a page loads
//! - Rating the total footprint on an A+..F scale
//! - Flagging elements whose resource exceeds a budget derived from the
//!   rendered area
//! - Debounced footprint change notification
//! - A host runtime and observability

pub mod error;
pub mod format;
pub mod hints;
pub mod models;
pub mod notify;
pub mod observability;
pub mod options;
pub mod placement;
pub mod rating;
pub mod registry;
pub mod resource;
pub mod runtime;
pub mod sentinel;

pub use error::{Result, SentinelError};
pub use models::*;
pub use observability::{SentinelMetrics, StructuredLogger};
pub use options::{ResourceFilter, ScheduleConfig, SentinelOptions};
pub use rating::{color_for, rating_for, Rating};
pub use registry::{ResourceRegistry, Signal, TimerKind};
pub use resource::ResourceRecord;
pub use sentinel::{DocumentView, FootprintListener, Sentinel, SentinelHost};
