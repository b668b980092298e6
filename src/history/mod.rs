//! Undo/redo history over page mutations.
//!
//! Every mutation of a [`Page`] is expressed as a [`HistoryEntry`] that knows
//! how to apply and revert itself. [`History`] keeps the two stacks; entries
//! only reference strokes through `Arc`, they never own page state.

use crate::draw::{Page, Stroke, StrokeId};
use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;


/// Default number of undoable entries kept.
pub const DEFAULT_CAPACITY: usize = 100;

/// One stroke replaced by an edited copy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeChange {
    pub id: StrokeId,
    pub before: Arc<Stroke>,
    pub after: Arc<Stroke>,
}

/// A reversible page mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    /// Stroke appended on top of the page
    StrokeAdded { id: StrokeId, stroke: Arc<Stroke> },
    /// Stroke taken out of the page from `index`
    StrokeRemoved {
        id: StrokeId,
        stroke: Arc<Stroke>,
        index: usize,
    },
    /// Strokes replaced in place by transformed copies (move, recolor, ...)
    ObjectTransformed { changes: Vec<StrokeChange> },
    /// Several entries forming one user action; applied in order, reverted in reverse
    Composite(Vec<HistoryEntry>),
}

impl HistoryEntry {
    /// Performs the mutation (initial application and redo).
    pub fn apply(&self, page: &mut Page) {
        match self {
            HistoryEntry::StrokeAdded { id, stroke } => page.append(*id, stroke.clone()),
            HistoryEntry::StrokeRemoved { id, .. } => {
                page.remove(*id);
            }
            HistoryEntry::ObjectTransformed { changes } => {
                for change in changes {
                    page.replace(change.id, change.after.clone());
                }
            }
            HistoryEntry::Composite(entries) => {
                for entry in entries {
                    entry.apply(page);
                }
            }
        }
    }

    /// Inverts the mutation (undo).
    pub fn revert(&self, page: &mut Page) {
        match self {
            HistoryEntry::StrokeAdded { id, .. } => {
                page.remove(*id);
            }
            HistoryEntry::StrokeRemoved { id, stroke, index } => {
                page.insert(*index, *id, stroke.clone())
            }
            HistoryEntry::ObjectTransformed { changes } => {
                for change in changes.iter().rev() {
                    page.replace(change.id, change.before.clone());
                }
            }
            HistoryEntry::Composite(entries) => {
                for entry in entries.iter().rev() {
                    entry.revert(page);
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryEntry::StrokeAdded { .. } => "add stroke",
            HistoryEntry::StrokeRemoved { .. } => "remove stroke",
            HistoryEntry::ObjectTransformed { .. } => "transform",
            HistoryEntry::Composite(_) => "composite",
        }
    }

    /// Every stroke version this entry touches, for damage tracking.
    pub fn strokes(&self) -> Vec<&Arc<Stroke>> {
        match self {
            HistoryEntry::StrokeAdded { stroke, .. } | HistoryEntry::StrokeRemoved { stroke, .. } => {
                vec![stroke]
            }
            HistoryEntry::ObjectTransformed { changes } => changes
                .iter()
                .flat_map(|change| [&change.before, &change.after])
                .collect(),
            HistoryEntry::Composite(entries) => {
                entries.iter().flat_map(|entry| entry.strokes()).collect()
            }
        }
    }
}

/// Bounded undo/redo stacks.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
    evicted: u64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// `capacity` is raised to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            undo: VecDeque::with_capacity(capacity),
            redo: Vec::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Records an already-applied entry. Clears the redo stack.
    ///
    /// Returns the oldest entry when it had to be evicted to stay within capacity.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.redo.clear();
        self.undo.push_back(entry);
        if self.undo.len() > self.capacity {
            self.evicted += 1;
            let oldest = self.undo.pop_front();
            debug!(
                "History full ({} entries); evicted oldest entry ({} total)",
                self.capacity, self.evicted
            );
            return oldest;
        }
        None
    }

    /// Reverts the latest entry. A no-op returning `None` when there is nothing to undo.
    pub fn undo(&mut self, page: &mut Page) -> Option<&HistoryEntry> {
        let entry = self.undo.pop_back()?;
        entry.revert(page);
        self.redo.push(entry);
        self.redo.last()
    }

    /// Re-applies the latest undone entry. A no-op returning `None` when there is nothing to redo.
    pub fn redo(&mut self, page: &mut Page) -> Option<&HistoryEntry> {
        let entry = self.redo.pop()?;
        entry.apply(page);
        self.undo.push_back(entry);
        self.undo.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped from the bottom of the undo stack so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
