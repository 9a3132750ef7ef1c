//! Per-resource size record
//!
//! A record is created from the first timing sample seen for a URL and
//! tracks that resource's size for the rest of the page session. It also
//! decides, per element displaying it, whether an oversize hint is shown.

use crate::error::{Result, SentinelError};
use crate::format::format_bytes;
use crate::hints::{Hint, HintBoard, HintChange, HintKey, HintRenderer};
use crate::models::TimingSample;
use crate::options::SentinelOptions;
use crate::placement::{is_small_box, resolve_anchor, resolve_budget, Placement, RenderedElement};
use std::sync::Arc;
use tracing::trace;

/// Why a hint evaluation stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Resource too small to be worth the geometry work
    BelowIgnoreThreshold,
    /// Element has no box to measure
    NoAnchor,
    /// Box not laid out yet
    ZeroArea,
}

/// Result of evaluating one (resource, element) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintOutcome {
    Skipped(SkipReason),
    WithinBudget {
        budget_bytes: u64,
        change: HintChange,
    },
    OverBudget {
        budget_bytes: u64,
        excess_bytes: u64,
        change: HintChange,
    },
}

/// Size record for one fetched resource
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    url: String,
    size_bytes: u64,
    options: Arc<SentinelOptions>,
}

impl ResourceRecord {
    /// Create a record from its first sample
    pub fn new(sample: &TimingSample, options: Arc<SentinelOptions>) -> Self {
        Self {
            url: sample.url.clone(),
            size_bytes: Self::size_from_sample(sample),
            options,
        }
    }

    /// Size of a sample: transfer size, else encoded body size, else 0
    ///
    /// Resources served from cache report a transfer size of 0 and usually an
    /// encoded body size of 0 as well, so cached assets are under-reported.
    /// The timing API has no way to recover their real size.
    pub fn size_from_sample(sample: &TimingSample) -> u64 {
        [sample.transfer_size, sample.encoded_body_size]
            .into_iter()
            .find(|size| *size > 0)
            .unwrap_or(0)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn options(&self) -> &Arc<SentinelOptions> {
        &self.options
    }

    /// Apply a newer sample for the same URL
    ///
    /// Returns whether the size changed.
    pub fn update_if_needed(&mut self, sample: &TimingSample) -> Result<bool> {
        if sample.url != self.url {
            return Err(SentinelError::IdentityMismatch {
                expected: self.url.clone(),
                got: sample.url.clone(),
            });
        }

        let size = Self::size_from_sample(sample);
        if size == self.size_bytes {
            return Ok(false);
        }
        self.size_bytes = size;
        Ok(true)
    }

    /// Decide whether `element` gets an oversize hint, and apply it
    pub fn evaluate_hint(
        &self,
        element: &RenderedElement,
        device_pixel_ratio: f64,
        board: &mut HintBoard,
        renderer: &mut dyn HintRenderer,
    ) -> HintOutcome {
        if self.size_bytes < self.options.ignore_resources_below_bytes_threshold {
            return HintOutcome::Skipped(SkipReason::BelowIgnoreThreshold);
        }

        let Some(anchor) = resolve_anchor(element) else {
            return HintOutcome::Skipped(SkipReason::NoAnchor);
        };

        let key = HintKey {
            anchor: anchor.id,
            url: self.url.clone(),
        };

        match resolve_budget(anchor.rect, device_pixel_ratio, self.size_bytes, &self.options) {
            Placement::Abstain => HintOutcome::Skipped(SkipReason::ZeroArea),
            Placement::WithinBudget { budget_bytes } => HintOutcome::WithinBudget {
                budget_bytes,
                change: board.withdraw(&key, renderer),
            },
            Placement::OverBudget {
                budget_bytes,
                excess_bytes,
            } => {
                trace!(
                    url = %self.url,
                    anchor = anchor.id.0,
                    size_bytes = self.size_bytes,
                    budget_bytes,
                    "Resource over budget"
                );
                let hint = Hint {
                    key,
                    size_bytes: self.size_bytes,
                    budget_bytes,
                    small: is_small_box(anchor.rect),
                    size_label: format_bytes(self.size_bytes),
                    budget_label: format!("max {}", format_bytes(budget_bytes)),
                };
                HintOutcome::OverBudget {
                    budget_bytes,
                    excess_bytes,
                    change: board.apply(hint, renderer),
                }
            }
        }
    }
}
