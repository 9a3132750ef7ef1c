//! Area-proportional byte budget
//!
//! The budget scales with the physical pixels a resource occupies, similar
//! to how Lighthouse judges properly sized images, and is capped by an
//! absolute per-resource ceiling.

use super::Rect;
use crate::options::SentinelOptions;

/// Reference area the per-area threshold is expressed in
const REFERENCE_AREA_PX: f64 = 100.0 * 100.0;

/// Boxes narrower or shorter than this get the condensed label
const SMALL_BOX_PX: f64 = 200.0;

/// Outcome of checking a resource against its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Box not laid out yet, no judgement possible
    Abstain,
    WithinBudget { budget_bytes: u64 },
    OverBudget { budget_bytes: u64, excess_bytes: u64 },
}

impl Placement {
    pub fn is_over_budget(&self) -> bool {
        matches!(self, Placement::OverBudget { .. })
    }
}

/// Area in physical pixels
pub fn physical_area(rect: Rect, device_pixel_ratio: f64) -> f64 {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    rect.width * rect.height * dpr * dpr
}

/// Check a resource size against the budget of the box it renders in
pub fn resolve_budget(
    rect: Rect,
    device_pixel_ratio: f64,
    size_bytes: u64,
    options: &SentinelOptions,
) -> Placement {
    let area = physical_area(rect, device_pixel_ratio);
    let area_budget = area / REFERENCE_AREA_PX * options.max_bytes_per_100x100_threshold as f64;

    // also catches NaN from garbage geometry
    if !(area_budget > 0.0) {
        return Placement::Abstain;
    }

    let budget = area_budget.min(options.max_bytes_per_resource_threshold as f64);
    let budget_bytes = budget.floor() as u64;

    if size_bytes as f64 > budget {
        Placement::OverBudget {
            budget_bytes,
            excess_bytes: size_bytes - budget_bytes,
        }
    } else {
        Placement::WithinBudget { budget_bytes }
    }
}

/// Whether the renderer should use the condensed label
pub fn is_small_box(rect: Rect) -> bool {
    rect.width < SMALL_BOX_PX || rect.height < SMALL_BOX_PX
}
