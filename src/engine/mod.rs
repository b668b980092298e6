//! Ink engine: the single sequential stage of the pipeline.
//!
//! Owns the palm arbiter, the strokes being drawn, the committed page and its
//! history. Everything that mutates the page goes through a [`HistoryEntry`],
//! except provisional touch strokes, which are only committed once the arbiter
//! settles them and are dropped silently when retracted.

use crate::config::Config;
use crate::device::{DeviceId, DeviceKind};
use crate::draw::{
    DirtyTracker, EraserMode, Page, PressureCurve, Stroke, StrokeBuilder, StrokeId,
    ToolDescriptor, erase,
};
use crate::history::{History, HistoryEntry, StrokeChange};
use crate::input::{
    ArbiterSettings, CanvasSize, ContactKey, Decision, InputEvent, PalmArbiter, PointerSample,
    RejectReason, ToolHint,
};
use crate::util::Bounds;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;


/// Offset applied to pasted strokes so they do not hide the originals.
pub const PASTE_OFFSET: f64 = 20.0;

/// Selection boxes smaller than this on both sides select nothing.
pub const MIN_SELECTION_SIZE: f64 = 5.0;

/// Everything the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub arbiter: ArbiterSettings,
    pub curve: PressureCurve,
    /// Moving-average window in samples
    pub smoothing: usize,
    pub eraser_mode: EraserMode,
    /// Eraser width; the hit radius is twice this
    pub eraser_width: f64,
    pub history_capacity: usize,
    pub canvas: CanvasSize,
    pub tool: ToolDescriptor,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            arbiter: ArbiterSettings::from_config(&config.palm_rejection),
            curve: PressureCurve::from_config(&config.stroke),
            smoothing: config.stroke.smoothing_window,
            eraser_mode: config.eraser.mode,
            eraser_width: config.eraser.width,
            history_capacity: config.history.capacity,
            canvas: CanvasSize {
                width: config.canvas.width,
                height: config.canvas.height,
            },
            tool: config.initial_tool(),
        }
    }
}

/// Notifications for callers that surface ink activity.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StrokeCommitted { id: StrokeId },
    ContactRejected { key: ContactKey, reason: RejectReason },
    /// A provisional touch stroke was discarded because the stylus landed on it
    ContactRetracted { key: ContactKey },
    /// A contact was cut short (disconnect, explicit abort) and left no ink
    ContactAborted { key: ContactKey },
    /// The oldest undo step was dropped to stay within capacity
    HistoryEvicted { label: &'static str },
    StrokesErased { removed: usize, pieces: usize },
}

/// Ink of one accepted contact while it is down.
#[derive(Debug)]
enum LiveInk {
    Draw(StrokeBuilder),
    Erase(Vec<(f64, f64)>),
}

/// Ink of a lifted contact waiting to be committed.
#[derive(Debug)]
enum FinishedInk {
    Stroke(Stroke),
    Erase(Vec<(f64, f64)>),
}

impl LiveInk {
    fn finish(self) -> Option<FinishedInk> {
        match self {
            LiveInk::Draw(builder) => builder.finish().map(FinishedInk::Stroke),
            LiveInk::Erase(path) if path.is_empty() => None,
            LiveInk::Erase(path) => Some(FinishedInk::Erase(path)),
        }
    }
}

/// The stroke capture core. Single-threaded; owned by one consumer task.
pub struct InkEngine {
    settings: EngineSettings,
    arbiter: PalmArbiter,
    live: HashMap<ContactKey, LiveInk>,
    parked: BTreeMap<ContactKey, FinishedInk>,
    page: Page,
    history: History,
    tool: ToolDescriptor,
    events: Vec<EngineEvent>,
    dirty: DirtyTracker,
}

impl InkEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            arbiter: PalmArbiter::new(settings.arbiter),
            history: History::new(settings.history_capacity),
            tool: settings.tool,
            settings,
            live: HashMap::new(),
            parked: BTreeMap::new(),
            page: Page::new(),
            events: Vec::new(),
            dirty: DirtyTracker::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn register_device(&mut self, device: DeviceId, kind: DeviceKind) {
        self.arbiter.register_device(device, kind);
    }

    pub fn arbiter(&self) -> &PalmArbiter {
        &self.arbiter
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    pub fn handle_event(&mut self, event: &InputEvent) {
        let decisions = self.arbiter.handle(event);
        self.apply_decisions(decisions);
    }

    /// Advances time without input (pending confirmations, provisional strokes).
    pub fn tick(&mut self, now_us: u64) {
        let decisions = self.arbiter.tick(now_us);
        self.apply_decisions(decisions);
    }

    /// Discards a contact's uncommitted ink without touching history.
    pub fn abort_contact(&mut self, key: ContactKey) -> bool {
        let known = self.arbiter.abort_contact(key);
        let dropped = self.discard(key);
        if known || dropped {
            self.events.push(EngineEvent::ContactAborted { key });
        }
        known || dropped
    }

    /// Discards every uncommitted contact of a device that went away.
    pub fn abort_device(&mut self, device: DeviceId) {
        let mut keys = self.arbiter.abort_device(device);
        keys.extend(self.live.keys().filter(|key| key.device == device).copied());
        keys.extend(self.parked.keys().filter(|key| key.device == device).copied());
        keys.sort();
        keys.dedup();

        for key in keys {
            self.discard(key);
            self.events.push(EngineEvent::ContactAborted { key });
        }
    }

    /// Ends the session: finishes accepted strokes, commits provisional ones and
    /// drops contacts still pending.
    pub fn finish(&mut self) {
        let decisions = self.arbiter.finish();
        self.apply_decisions(decisions);

        let leftovers: Vec<ContactKey> = self.live.keys().copied().collect();
        for key in leftovers {
            if let Some(ink) = self.live.remove(&key).and_then(LiveInk::finish) {
                self.commit_finished(ink);
            }
        }
        let parked = std::mem::take(&mut self.parked);
        for (_, ink) in parked {
            self.commit_finished(ink);
        }
    }

    fn apply_decisions(&mut self, decisions: Vec<Decision>) {
        for decision in decisions {
            match decision {
                Decision::Forward { key, samples } => {
                    for sample in &samples {
                        self.feed(key, sample);
                    }
                }
                Decision::Rejected { key, reason } => {
                    self.discard(key);
                    self.events.push(EngineEvent::ContactRejected { key, reason });
                }
                Decision::Retracted { key } => {
                    self.discard(key);
                    self.events.push(EngineEvent::ContactRetracted { key });
                }
                Decision::Ended { key, provisional } => {
                    let Some(ink) = self.live.remove(&key).and_then(LiveInk::finish) else {
                        continue;
                    };
                    if provisional {
                        debug!("{} lifted; holding its ink until the stylus window closes", key);
                        self.parked.insert(key, ink);
                    } else {
                        self.commit_finished(ink);
                    }
                }
                Decision::Settled { key } => {
                    if let Some(ink) = self.parked.remove(&key) {
                        self.commit_finished(ink);
                    }
                }
                Decision::Aborted { key } => {
                    self.discard(key);
                    self.events.push(EngineEvent::ContactAborted { key });
                }
            }
        }
    }

    fn feed(&mut self, key: ContactKey, sample: &PointerSample) {
        let tool = self.tool;
        let curve = self.settings.curve;
        let smoothing = self.settings.smoothing;
        let ink = self.live.entry(key).or_insert_with(|| {
            if sample.tool == ToolHint::Eraser || tool.is_eraser() {
                LiveInk::Erase(Vec::new())
            } else {
                LiveInk::Draw(StrokeBuilder::new(tool, curve, smoothing))
            }
        });

        match ink {
            LiveInk::Draw(builder) => {
                let previous = builder.points().last().copied();
                let point = builder.push(sample);
                let mut bounds = Bounds::from_point(point.x, point.y);
                if let Some(previous) = previous {
                    bounds.include(previous.x, previous.y);
                }
                self.dirty.mark_bounds(bounds.inflate(point.width / 2.0 + 1.0));
            }
            LiveInk::Erase(path) => path.push((sample.x, sample.y)),
        }
    }

    /// Drops uncommitted ink for a contact. Returns whether there was any.
    fn discard(&mut self, key: ContactKey) -> bool {
        let mut dropped = false;
        if let Some(ink) = self.live.remove(&key) {
            if let LiveInk::Draw(builder) = &ink {
                self.dirty.mark_optional(builder.bounds());
            }
            dropped = true;
        }
        if let Some(ink) = self.parked.remove(&key) {
            if let FinishedInk::Stroke(stroke) = &ink {
                self.dirty.mark_stroke(stroke);
            }
            dropped = true;
        }
        dropped
    }

    fn commit_finished(&mut self, ink: FinishedInk) {
        match ink {
            FinishedInk::Stroke(stroke) => {
                self.commit_stroke(stroke);
            }
            FinishedInk::Erase(path) => self.erase_along(&path),
        }
    }

    // ------------------------------------------------------------------
    // Stroke/History API
    // ------------------------------------------------------------------

    /// Read-only snapshot of the committed strokes in draw order.
    pub fn current_strokes(&self) -> Vec<Arc<Stroke>> {
        self.page.snapshot()
    }

    /// Previews of strokes not yet committed: live ones and provisional ones.
    pub fn in_progress(&self) -> Vec<Stroke> {
        let live = self.live.values().filter_map(|ink| match ink {
            LiveInk::Draw(builder) => builder.preview(),
            LiveInk::Erase(_) => None,
        });
        let parked = self.parked.values().filter_map(|ink| match ink {
            FinishedInk::Stroke(stroke) => Some(stroke.clone()),
            FinishedInk::Erase(_) => None,
        });
        live.chain(parked).collect()
    }

    /// Commits a finished stroke on top of the page. Empty strokes are refused.
    pub fn commit_stroke(&mut self, stroke: Stroke) -> Option<StrokeId> {
        if stroke.is_empty() {
            debug!("Refusing to commit an empty stroke");
            return None;
        }

        let id = self.page.allocate_id();
        info!(
            "Committed {} ({} with {} points)",
            id,
            stroke.tool.kind.as_str(),
            stroke.len()
        );
        self.record(HistoryEntry::StrokeAdded {
            id,
            stroke: Arc::new(stroke),
        });
        self.events.push(EngineEvent::StrokeCommitted { id });
        Some(id)
    }

    /// Ids of committed strokes whose bounds overlap `region`, in page order.
    ///
    /// The box may be given with its corners in any order. Feed the result to
    /// [`remove_strokes`](Self::remove_strokes),
    /// [`translate_strokes`](Self::translate_strokes) or a copy for
    /// [`paste`](Self::paste).
    pub fn strokes_in(&self, region: Bounds) -> Vec<StrokeId> {
        let Some(region) = Bounds::from_points([
            (region.min_x, region.min_y),
            (region.max_x, region.max_y),
        ]) else {
            return Vec::new();
        };
        if region.width() < MIN_SELECTION_SIZE && region.height() < MIN_SELECTION_SIZE {
            debug!(
                "Selection box {:.1}x{:.1} too small, ignoring",
                region.width(),
                region.height()
            );
            return Vec::new();
        }

        self.page
            .iter()
            .filter(|(_, stroke)| {
                stroke
                    .bounds()
                    .is_some_and(|bounds| bounds.intersects(&region))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Removes strokes as one undoable action. Returns how many were removed.
    pub fn remove_strokes(&mut self, ids: &[StrokeId]) -> usize {
        let removals = self.removals(ids.iter().copied());
        let count = removals.len();
        if count > 0 {
            self.record(HistoryEntry::Composite(removals));
        }
        count
    }

    /// Moves strokes by `(dx, dy)` as one undoable action.
    pub fn translate_strokes(&mut self, ids: &[StrokeId], dx: f64, dy: f64) -> usize {
        let changes: Vec<StrokeChange> = ids
            .iter()
            .filter_map(|id| {
                let before = self.page.get(*id)?.clone();
                let after = Arc::new(before.translated(dx, dy));
                Some(StrokeChange {
                    id: *id,
                    before,
                    after,
                })
            })
            .collect();
        let count = changes.len();
        if count > 0 {
            self.record(HistoryEntry::ObjectTransformed { changes });
        }
        count
    }

    /// Adds copies of `strokes`, offset by [`PASTE_OFFSET`], as one undoable action.
    pub fn paste(&mut self, strokes: &[Stroke]) -> Vec<StrokeId> {
        let entries: Vec<HistoryEntry> = strokes
            .iter()
            .filter(|stroke| !stroke.is_empty())
            .map(|stroke| HistoryEntry::StrokeAdded {
                id: self.page.allocate_id(),
                stroke: Arc::new(stroke.translated(PASTE_OFFSET, PASTE_OFFSET)),
            })
            .collect();

        let ids: Vec<StrokeId> = entries
            .iter()
            .filter_map(|entry| match entry {
                HistoryEntry::StrokeAdded { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        if !entries.is_empty() {
            self.record(HistoryEntry::Composite(entries));
        }
        ids
    }

    /// Removes every committed stroke as one undoable action.
    pub fn clear(&mut self) -> usize {
        let ids = self.page.ids();
        self.remove_strokes(&ids)
    }

    /// Reverts the latest action. Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&mut self.page) {
            Some(entry) => {
                debug!("Undo {}", entry.label());
                for stroke in entry.strokes() {
                    self.dirty.mark_stroke(stroke);
                }
                true
            }
            None => false,
        }
    }

    /// Re-applies the latest undone action. Returns `false` when there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&mut self.page) {
            Some(entry) => {
                debug!("Redo {}", entry.label());
                for stroke in entry.strokes() {
                    self.dirty.mark_stroke(stroke);
                }
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Tool used by contacts that start from now on.
    pub fn set_tool(&mut self, tool: ToolDescriptor) {
        self.tool = tool;
    }

    pub fn tool(&self) -> &ToolDescriptor {
        &self.tool
    }

    /// Replaces the page with one loaded from disk. History is reset.
    pub fn load_page(&mut self, page: Page) {
        self.page = page;
        self.history.clear();
        self.dirty.mark_full();
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Canvas regions changed since the last call, for a renderer to repaint.
    ///
    /// The capture runner has no renderer and never drains these; the tracker
    /// falls back to one full-canvas region once enough have piled up.
    pub fn take_dirty_regions(&mut self) -> Vec<Bounds> {
        let canvas = self.settings.canvas;
        self.dirty.take_regions(canvas.width, canvas.height)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn record(&mut self, entry: HistoryEntry) {
        entry.apply(&mut self.page);
        for stroke in entry.strokes() {
            self.dirty.mark_stroke(stroke);
        }
        if let Some(evicted) = self.history.push(entry) {
            self.events.push(EngineEvent::HistoryEvicted {
                label: evicted.label(),
            });
        }
    }

    /// StrokeRemoved entries in descending index order, so reverting them in
    /// reverse restores every original position.
    fn removals(&self, ids: impl Iterator<Item = StrokeId>) -> Vec<HistoryEntry> {
        let mut found: Vec<(usize, StrokeId, Arc<Stroke>)> = ids
            .filter_map(|id| {
                let index = self.page.index_of(id)?;
                Some((index, id, self.page.get(id)?.clone()))
            })
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0));
        found.dedup_by_key(|(index, _, _)| *index);

        found
            .into_iter()
            .map(|(index, id, stroke)| HistoryEntry::StrokeRemoved { id, stroke, index })
            .collect()
    }

    fn erase_along(&mut self, path: &[(f64, f64)]) {
        let radius = self.settings.eraser_width * 2.0;
        let erasures = erase(&self.page, path, radius, self.settings.eraser_mode);
        if erasures.is_empty() {
            return;
        }

        let mut entries = self.removals(erasures.iter().map(|erasure| erasure.id));
        let removed = entries.len();
        let mut pieces = 0;
        for erasure in erasures {
            for piece in erasure.pieces {
                pieces += 1;
                entries.push(HistoryEntry::StrokeAdded {
                    id: self.page.allocate_id(),
                    stroke: Arc::new(piece),
                });
            }
        }

        debug!(
            "Eraser removed {} stroke(s), kept {} piece(s)",
            removed, pieces
        );
        self.record(HistoryEntry::Composite(entries));
        self.events
            .push(EngineEvent::StrokesErased { removed, pieces });
    }
}
