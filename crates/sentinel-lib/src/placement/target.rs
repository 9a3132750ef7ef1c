//! Rendered element model and target box selection
//!
//! A resource URL is often found on an element that has no box of its own
//! (`<source>` inside `<picture>` or `<video>`), or on an `<img>` whose
//! visible box is defined by its `<picture>` container. The container is
//! the measured and anchored box in both cases.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Host assigned element identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

/// Rendered box size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Parent of a rendered element, as far as placement needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentElement {
    pub id: ElementId,
    pub tag: String,
    #[serde(default)]
    pub rect: Rect,
}

/// An element currently in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedElement {
    pub id: ElementId,
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub parent: Option<ParentElement>,
}

impl RenderedElement {
    pub fn new(id: u64, tag: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: ElementId(id),
            tag: tag.into(),
            attributes: BTreeMap::new(),
            rect,
            parent: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_parent(mut self, id: u64, tag: impl Into<String>, rect: Rect) -> Self {
        self.parent = Some(ParentElement {
            id: ElementId(id),
            tag: tag.into(),
            rect,
        });
        self
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

/// Which box is measured for an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBox {
    /// The element itself
    Plain,
    /// The enclosing `<picture>`
    PictureContainer,
    /// The enclosing `<video>`
    VideoContainer,
}

/// Classify an element by its container
pub fn classify(element: &RenderedElement) -> TargetBox {
    match &element.parent {
        Some(parent) if parent.tag.eq_ignore_ascii_case("picture") => TargetBox::PictureContainer,
        Some(parent) if parent.tag.eq_ignore_ascii_case("video") => TargetBox::VideoContainer,
        _ => TargetBox::Plain,
    }
}

/// Box a hint is measured against and attached to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub id: ElementId,
    pub rect: Rect,
}

/// Resolve the anchor box for an element
///
/// Returns `None` for a bare `<source>`: it has no box and no container to
/// stand in for it.
pub fn resolve_anchor(element: &RenderedElement) -> Option<Anchor> {
    match (classify(element), &element.parent) {
        (TargetBox::PictureContainer | TargetBox::VideoContainer, Some(parent)) => Some(Anchor {
            id: parent.id,
            rect: parent.rect,
        }),
        _ if element.is_tag("source") => None,
        _ => Some(Anchor {
            id: element.id,
            rect: element.rect,
        }),
    }
}
