//! Oversize hints
//!
//! The [`HintBoard`] remembers which hints are currently shown, keyed by
//! anchor element and resource URL, and only forwards real changes to the
//! [`HintRenderer`]. Evaluating the same element twice with unchanged
//! geometry and size therefore never touches the document again.

mod lookup;

pub use lookup::{find_elements_with_url, search_term};

use crate::placement::ElementId;
use serde::Serialize;
use std::collections::HashMap;

/// Identity of a shown hint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HintKey {
    pub anchor: ElementId,
    pub url: String,
}

/// A hint as handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub key: HintKey,
    pub size_bytes: u64,
    pub budget_bytes: u64,
    /// Condensed label for boxes under 200px
    pub small: bool,
    pub size_label: String,
    pub budget_label: String,
}

/// Document side of hint rendering
pub trait HintRenderer {
    fn attach(&mut self, hint: &Hint);
    fn update(&mut self, hint: &Hint);
    fn remove(&mut self, key: &HintKey);
}

/// What the board did with a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintChange {
    Attached,
    Updated,
    Unchanged,
    Removed,
    /// Withdrawal of a hint that was never shown
    Absent,
}

/// Currently shown hints
#[derive(Debug, Default)]
pub struct HintBoard {
    hints: HashMap<HintKey, Hint>,
}

impl HintBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show or refresh a hint
    pub fn apply(&mut self, hint: Hint, renderer: &mut dyn HintRenderer) -> HintChange {
        match self.hints.get(&hint.key) {
            Some(existing) if *existing == hint => HintChange::Unchanged,
            Some(_) => {
                renderer.update(&hint);
                self.hints.insert(hint.key.clone(), hint);
                HintChange::Updated
            }
            None => {
                renderer.attach(&hint);
                self.hints.insert(hint.key.clone(), hint);
                HintChange::Attached
            }
        }
    }

    /// Remove a hint if shown
    pub fn withdraw(&mut self, key: &HintKey, renderer: &mut dyn HintRenderer) -> HintChange {
        match self.hints.remove(key) {
            Some(_) => {
                renderer.remove(key);
                HintChange::Removed
            }
            None => HintChange::Absent,
        }
    }

    pub fn get(&self, key: &HintKey) -> Option<&Hint> {
        self.hints.get(key)
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// Shown hints ordered by anchor, then URL
    pub fn sorted(&self) -> Vec<&Hint> {
        let mut hints: Vec<&Hint> = self.hints.values().collect();
        hints.sort_by(|a, b| a.key.cmp(&b.key));
        hints
    }
}

/// Renderer operation, as captured by [`RecordingRenderer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    Attach(Hint),
    Update(Hint),
    Remove(HintKey),
}

/// Renderer that only records what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub ops: Vec<RenderOp>,
}

impl HintRenderer for RecordingRenderer {
    fn attach(&mut self, hint: &Hint) {
        self.ops.push(RenderOp::Attach(hint.clone()));
    }

    fn update(&mut self, hint: &Hint) {
        self.ops.push(RenderOp::Update(hint.clone()));
    }

    fn remove(&mut self, key: &HintKey) {
        self.ops.push(RenderOp::Remove(key.clone()));
    }
}
