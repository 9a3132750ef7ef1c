//! Core data models for the footprint engine

use crate::error::SentinelError;
use crate::format::{format_bytes, format_signed_bytes};
use crate::rating::{rating_for, Rating};
use serde::{Deserialize, Serialize};

/// Kind of a performance timing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A sub-resource fetched by the document
    Resource,
    /// The document itself
    Navigation,
}

/// Raw timing entry as reported by the environment
///
/// Every field is optional because hosts forward whatever the browser
/// handed them; validation happens in [`TimingSample::try_from`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub transfer_size: Option<f64>,
    #[serde(default)]
    pub encoded_body_size: Option<f64>,
}

impl TimingEntry {
    /// Build a resource entry
    pub fn resource(name: impl Into<String>, transfer_size: f64, encoded_body_size: f64) -> Self {
        Self {
            name: Some(name.into()),
            entry_type: Some("resource".to_string()),
            transfer_size: Some(transfer_size),
            encoded_body_size: Some(encoded_body_size),
        }
    }

    /// Build a navigation entry for the document itself
    pub fn navigation(name: impl Into<String>, transfer_size: f64, encoded_body_size: f64) -> Self {
        Self {
            entry_type: Some("navigation".to_string()),
            ..Self::resource(name, transfer_size, encoded_body_size)
        }
    }
}

/// Validated timing sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSample {
    pub url: String,
    pub entry_type: EntryType,
    /// Headers and body sent over the wire, 0 for cache hits
    pub transfer_size: u64,
    /// Body only
    pub encoded_body_size: u64,
}

impl TimingSample {
    pub fn new(url: impl Into<String>, transfer_size: u64, encoded_body_size: u64) -> Self {
        Self {
            url: url.into(),
            entry_type: EntryType::Resource,
            transfer_size,
            encoded_body_size,
        }
    }
}

impl TryFrom<&TimingEntry> for TimingSample {
    type Error = SentinelError;

    fn try_from(entry: &TimingEntry) -> Result<Self, Self::Error> {
        let url = match entry.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(SentinelError::InvalidSample("missing name".to_string())),
        };

        let entry_type = match entry.entry_type.as_deref() {
            Some("resource") => EntryType::Resource,
            Some("navigation") => EntryType::Navigation,
            other => {
                return Err(SentinelError::InvalidSample(format!(
                    "unsupported entry type {:?} for {}",
                    other, url
                )))
            }
        };

        Ok(Self {
            url,
            entry_type,
            transfer_size: sanitize_size(entry.transfer_size),
            encoded_body_size: sanitize_size(entry.encoded_body_size),
        })
    }
}

/// Largest size taken at face value, the biggest integer an f64 holds exactly
pub const MAX_SAMPLE_BYTES: u64 = (1 << 53) - 1;

/// Garbage sizes (missing, negative, NaN, infinite, absurdly large) count
/// as zero
fn sanitize_size(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 && v <= MAX_SAMPLE_BYTES as f64 => v as u64,
        _ => 0,
    }
}

/// Aggregate footprint with its rating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalFootprint {
    pub bytes: u64,
    pub bytes_formatted: String,
    pub rating: Rating,
    pub color: String,
}

impl TotalFootprint {
    pub fn from_bytes(bytes: u64) -> Self {
        let rating = rating_for(bytes);
        Self {
            bytes,
            bytes_formatted: format_bytes(bytes),
            rating,
            color: rating.color().to_string(),
        }
    }
}

/// Change since the last reported footprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintDelta {
    pub bytes: i64,
    pub bytes_formatted: String,
}

/// Footprint handed to listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintResult {
    pub total: TotalFootprint,
    pub last_delta: FootprintDelta,
}

impl FootprintResult {
    /// Footprint for `total_bytes` relative to a previously reported total
    pub fn new(total_bytes: u64, previous_bytes: u64) -> Self {
        let total = i64::try_from(total_bytes).unwrap_or(i64::MAX);
        let previous = i64::try_from(previous_bytes).unwrap_or(i64::MAX);
        let delta = total.saturating_sub(previous);
        Self {
            total: TotalFootprint::from_bytes(total_bytes),
            last_delta: FootprintDelta {
                bytes: delta,
                bytes_formatted: format_signed_bytes(delta),
            },
        }
    }
}

/// Data behind the summary widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintSummary {
    pub total: TotalFootprint,
    pub initial: Option<TotalFootprint>,
    /// Whether the initial bar is shown next to the total
    pub show_initial: bool,
    pub hint_count: usize,
    pub total_size_factor: f64,
    pub initial_size_factor: f64,
}
