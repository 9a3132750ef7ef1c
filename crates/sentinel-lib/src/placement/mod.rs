//! Hint placement
//!
//! Pure geometry: which box a resource is judged against and whether the
//! resource fits the byte budget of that box.

mod budget;
mod target;

pub use budget::{is_small_box, physical_area, resolve_budget, Placement};
pub use target::{
    classify, resolve_anchor, Anchor, ElementId, ParentElement, Rect, RenderedElement, TargetBox,
};
