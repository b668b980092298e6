//! Page container: the ordered set of committed strokes.

use super::stroke::Stroke;
use std::fmt;
use std::sync::Arc;

/// Identity of a committed stroke within a page. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeId(pub u64);

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stroke#{}", self.0)
    }
}

/// All committed strokes of a page in draw order (first = bottom layer).
///
/// Strokes are shared as `Arc<Stroke>` so snapshots and history entries
/// reference the same immutable data.
#[derive(Debug, Clone, Default)]
pub struct Page {
    strokes: Vec<(StrokeId, Arc<Stroke>)>,
    next_id: u64,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a page from loaded strokes, assigning fresh ids in order.
    pub fn from_strokes(strokes: impl IntoIterator<Item = Stroke>) -> Self {
        let mut page = Self::new();
        for stroke in strokes {
            page.push(Arc::new(stroke));
        }
        page
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrokeId, &Arc<Stroke>)> {
        self.strokes.iter().map(|(id, stroke)| (*id, stroke))
    }

    /// Read-only snapshot of the strokes in draw order.
    pub fn snapshot(&self) -> Vec<Arc<Stroke>> {
        self.strokes.iter().map(|(_, stroke)| stroke.clone()).collect()
    }

    pub fn ids(&self) -> Vec<StrokeId> {
        self.strokes.iter().map(|(id, _)| *id).collect()
    }

    pub fn get(&self, id: StrokeId) -> Option<&Arc<Stroke>> {
        self.strokes
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, stroke)| stroke)
    }

    pub fn index_of(&self, id: StrokeId) -> Option<usize> {
        self.strokes.iter().position(|(candidate, _)| *candidate == id)
    }

    pub fn allocate_id(&mut self) -> StrokeId {
        let id = StrokeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds a stroke on top with a fresh id.
    pub fn push(&mut self, stroke: Arc<Stroke>) -> StrokeId {
        let id = self.allocate_id();
        self.strokes.push((id, stroke));
        id
    }

    /// Inserts a stroke under a known id at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, id: StrokeId, stroke: Arc<Stroke>) {
        self.next_id = self.next_id.max(id.0 + 1);
        let index = index.min(self.strokes.len());
        self.strokes.insert(index, (id, stroke));
    }

    /// Appends a stroke under a known id.
    pub fn append(&mut self, id: StrokeId, stroke: Arc<Stroke>) {
        self.insert(self.strokes.len(), id, stroke);
    }

    /// Removes a stroke, returning its former index and data.
    pub fn remove(&mut self, id: StrokeId) -> Option<(usize, Arc<Stroke>)> {
        let index = self.index_of(id)?;
        let (_, stroke) = self.strokes.remove(index);
        Some((index, stroke))
    }

    /// Swaps the stroke stored under `id`, keeping its position.
    pub fn replace(&mut self, id: StrokeId, stroke: Arc<Stroke>) -> Option<Arc<Stroke>> {
        let slot = self.strokes.iter_mut().find(|(candidate, _)| *candidate == id)?;
        Some(std::mem::replace(&mut slot.1, stroke))
    }
}
