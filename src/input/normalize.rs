//! Event normalizer: raw evdev frames to [`PointerSample`]s.
//!
//! One normalizer exists per device and is driven by that device's reader.
//! Events accumulate into per-device state until `SYN_REPORT`, at which point
//! the changed contacts are emitted as Down/Move/Up samples in canvas space.

use super::events::{
    ContactId, InputEvent, Phase, PointerSample, RawEvent, RawEventKind, Tilt, ToolHint,
};
use crate::device::{AxisRange, Capabilities, DeviceId, DeviceKind, InputDevice, codes::*};
use log::{debug, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on tracked multi-touch slots per device.
const MAX_SLOTS: usize = 64;

/// Canvas dimensions that absolute axes are scaled into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// Diagnostic counters shared between a device reader and whoever reports on it.
#[derive(Debug, Default)]
pub struct NormalizerStats {
    samples: AtomicU64,
    malformed: AtomicU64,
    dropped_frames: AtomicU64,
    clamped_timestamps: AtomicU64,
}

impl NormalizerStats {
    /// Samples emitted downstream.
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Raw records dropped because they were out of range or unexpected.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Frames discarded after a kernel `SYN_DROPPED`.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Events whose timestamp went backwards and was clamped.
    pub fn clamped_timestamps(&self) -> u64 {
        self.clamped_timestamps.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// How a single-contact device signals that it is touching the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactSignal {
    TouchButton,
    Pressure,
    LeftButton,
}

#[derive(Debug, Default)]
struct PointerState {
    x: Option<f64>,
    y: Option<f64>,
    pressure: Option<f64>,
    tilt_x: Option<f64>,
    tilt_y: Option<f64>,
    touching: bool,
    was_touching: bool,
    pen_in_range: bool,
    rubber_in_range: bool,
    was_in_range: bool,
    dirty: bool,
}

#[derive(Debug, Default, Clone)]
struct Slot {
    tracking_id: Option<u32>,
    reported_id: Option<u32>,
    x: Option<f64>,
    y: Option<f64>,
    size: Option<f64>,
    pressure: Option<f64>,
    dirty: bool,
}

#[derive(Debug)]
enum Mode {
    Pointer {
        signal: ContactSignal,
        state: PointerState,
    },
    MultiTouch {
        slots: Vec<Slot>,
        current: Option<usize>,
    },
}

/// Converts one device's raw event stream into normalized input events.
pub struct EventNormalizer {
    device: DeviceId,
    caps: Capabilities,
    canvas: CanvasSize,
    mode: Mode,
    stats: Arc<NormalizerStats>,
    last_timestamp_us: u64,
    dropping: bool,
}

impl EventNormalizer {
    pub fn new(device: &InputDevice, canvas: CanvasSize, stats: Arc<NormalizerStats>) -> Self {
        let caps = device.capabilities().clone();
        let mode = if caps.is_multi_touch() && device.kind() != DeviceKind::Stylus {
            let slots = caps
                .mt_slot
                .map(|range| (range.max.max(0) as usize + 1).min(MAX_SLOTS))
                .unwrap_or(1);
            Mode::MultiTouch {
                slots: vec![Slot::default(); slots],
                current: Some(0),
            }
        } else {
            let signal = if caps.touch_button {
                ContactSignal::TouchButton
            } else if caps.pressure.is_some() {
                ContactSignal::Pressure
            } else {
                ContactSignal::LeftButton
            };
            let state = PointerState {
                // Relative pointers start centred on the canvas.
                x: caps.relative_motion.then_some(canvas.width / 2.0),
                y: caps.relative_motion.then_some(canvas.height / 2.0),
                ..Default::default()
            };
            Mode::Pointer { signal, state }
        };

        debug!(
            "Normalizer for {} ({}) using {} mode",
            device.id(),
            device.kind(),
            match mode {
                Mode::Pointer { .. } => "pointer",
                Mode::MultiTouch { .. } => "multi-touch",
            }
        );

        Self {
            device: device.id(),
            caps,
            canvas,
            mode,
            stats,
            last_timestamp_us: 0,
            dropping: false,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn stats(&self) -> &Arc<NormalizerStats> {
        &self.stats
    }

    /// Feeds one raw event; returns the events completed by it (only on `SYN_REPORT`).
    pub fn push(&mut self, event: RawEvent) -> Vec<InputEvent> {
        let timestamp_us = self.monotonic(event.timestamp_us);

        match event.kind {
            RawEventKind::SyncDropped => {
                debug!("{}: kernel dropped events, discarding frame", self.device);
                self.dropping = true;
                NormalizerStats::bump(&self.stats.dropped_frames);
                Vec::new()
            }
            RawEventKind::SyncReport if self.dropping => {
                self.dropping = false;
                self.discard_pending_changes();
                Vec::new()
            }
            RawEventKind::SyncReport => self.flush(timestamp_us),
            _ if self.dropping => Vec::new(),
            RawEventKind::Key { code, pressed } => {
                self.on_key(code, pressed);
                Vec::new()
            }
            RawEventKind::Abs { axis, value } => {
                self.on_abs(axis, value);
                Vec::new()
            }
            RawEventKind::Rel { axis, delta } => {
                self.on_rel(axis, delta);
                Vec::new()
            }
            RawEventKind::Other { .. } => Vec::new(),
        }
    }

    fn monotonic(&mut self, timestamp_us: u64) -> u64 {
        if timestamp_us < self.last_timestamp_us {
            trace!(
                "{}: timestamp went backwards ({} < {}), clamping",
                self.device, timestamp_us, self.last_timestamp_us
            );
            NormalizerStats::bump(&self.stats.clamped_timestamps);
            self.last_timestamp_us
        } else {
            self.last_timestamp_us = timestamp_us;
            timestamp_us
        }
    }

    fn malformed(&self, what: &str, axis: u16, value: i32) {
        trace!(
            "{}: dropping malformed {} record (code {:#x}, value {})",
            self.device, what, axis, value
        );
        NormalizerStats::bump(&self.stats.malformed);
    }

    /// Validates an absolute value against the advertised range.
    fn checked(&self, axis: u16, value: i32) -> Option<(AxisRange, f64)> {
        let Some(range) = self.caps.abs_range(axis) else {
            self.malformed("unadvertised axis", axis, value);
            return None;
        };
        match range.normalize(value) {
            Some(norm) => Some((range, norm)),
            None => {
                self.malformed("out-of-range", axis, value);
                None
            }
        }
    }

    fn on_key(&mut self, code: u16, pressed: bool) {
        let Mode::Pointer { signal, state } = &mut self.mode else {
            return;
        };

        match code {
            BTN_TOUCH if *signal == ContactSignal::TouchButton => state.touching = pressed,
            BTN_LEFT if *signal == ContactSignal::LeftButton => state.touching = pressed,
            BTN_TOOL_PEN => state.pen_in_range = pressed,
            BTN_TOOL_RUBBER => state.rubber_in_range = pressed,
            _ => {}
        }
    }

    fn on_abs(&mut self, axis: u16, value: i32) {
        if matches!(self.mode, Mode::MultiTouch { .. }) {
            self.on_mt_abs(axis, value);
            return;
        }

        if !matches!(
            axis,
            ABS_X | ABS_Y | ABS_PRESSURE | ABS_TILT_X | ABS_TILT_Y
        ) {
            return;
        }

        let Some((range, norm)) = self.checked(axis, value) else {
            return;
        };
        let canvas = self.canvas;
        let Mode::Pointer { signal, state } = &mut self.mode else {
            return;
        };

        match axis {
            ABS_X => state.x = Some(norm * canvas.width),
            ABS_Y => state.y = Some(norm * canvas.height),
            ABS_PRESSURE => {
                state.pressure = Some(norm);
                if *signal == ContactSignal::Pressure {
                    state.touching = value > 0;
                }
            }
            ABS_TILT_X => state.tilt_x = Some(range.tilt_degrees(value)),
            ABS_TILT_Y => state.tilt_y = Some(range.tilt_degrees(value)),
            _ => {}
        }
        state.dirty = true;
    }

    fn on_mt_abs(&mut self, axis: u16, value: i32) {
        match axis {
            ABS_MT_SLOT => {
                let valid = self.checked(axis, value).is_some();
                if let Mode::MultiTouch { slots, current } = &mut self.mode {
                    *current = (valid && (value as usize) < slots.len()).then_some(value as usize);
                }
            }
            ABS_MT_TRACKING_ID => {
                let id = (value >= 0).then_some(value as u32);
                self.with_slot(|slot| {
                    slot.tracking_id = id;
                    slot.dirty = true;
                });
            }
            ABS_MT_POSITION_X | ABS_MT_POSITION_Y | ABS_MT_TOUCH_MAJOR | ABS_MT_PRESSURE => {
                let Some((range, norm)) = self.checked(axis, value) else {
                    return;
                };
                let canvas = self.canvas;
                // Touch major shares the position axis units.
                let x_span = self.caps.mt_x.map(|r| r.span()).unwrap_or(range.span());
                self.with_slot(|slot| {
                    match axis {
                        ABS_MT_POSITION_X => slot.x = Some(norm * canvas.width),
                        ABS_MT_POSITION_Y => slot.y = Some(norm * canvas.height),
                        ABS_MT_TOUCH_MAJOR => {
                            slot.size = Some(value.max(0) as f64 / x_span * canvas.width)
                        }
                        _ => slot.pressure = Some(norm),
                    }
                    slot.dirty = true;
                });
            }
            _ => {}
        }
    }

    fn with_slot(&mut self, f: impl FnOnce(&mut Slot)) {
        if let Mode::MultiTouch { slots, current } = &mut self.mode {
            match current.and_then(|index| slots.get_mut(index)) {
                Some(slot) => f(slot),
                None => NormalizerStats::bump(&self.stats.malformed),
            }
        }
    }

    fn on_rel(&mut self, axis: u16, delta: i32) {
        let canvas = self.canvas;
        let Mode::Pointer { state, .. } = &mut self.mode else {
            return;
        };
        if !self.caps.relative_motion {
            NormalizerStats::bump(&self.stats.malformed);
            return;
        }

        match axis {
            REL_X => {
                let x = state.x.unwrap_or(0.0) + delta as f64;
                state.x = Some(x.clamp(0.0, canvas.width));
            }
            REL_Y => {
                let y = state.y.unwrap_or(0.0) + delta as f64;
                state.y = Some(y.clamp(0.0, canvas.height));
            }
            _ => return,
        }
        state.dirty = true;
    }

    fn discard_pending_changes(&mut self) {
        match &mut self.mode {
            Mode::Pointer { state, .. } => {
                state.touching = state.was_touching;
                state.dirty = false;
            }
            Mode::MultiTouch { slots, .. } => {
                for slot in slots.iter_mut() {
                    slot.tracking_id = slot.reported_id;
                    slot.dirty = false;
                }
            }
        }
    }

    fn flush(&mut self, timestamp_us: u64) -> Vec<InputEvent> {
        let mut out = Vec::new();
        let device = self.device;
        let pressure_supported = self.caps.pressure.is_some();
        let mt_pressure_supported = self.caps.mt_pressure.is_some();
        let tilt_supported = self.caps.supports_tilt();

        match &mut self.mode {
            Mode::Pointer { state, .. } => {
                let in_range = state.pen_in_range || state.rubber_in_range;
                if in_range != state.was_in_range {
                    state.was_in_range = in_range;
                    out.push(InputEvent::Proximity {
                        device,
                        timestamp_us,
                        in_range,
                    });
                }

                let phase = match (state.was_touching, state.touching) {
                    (false, true) => Some(Phase::Down),
                    (true, true) if state.dirty => Some(Phase::Move),
                    (true, false) => Some(Phase::Up),
                    _ => None,
                };

                if let (Some(phase), Some(x), Some(y)) = (phase, state.x, state.y) {
                    state.was_touching = phase != Phase::Up;
                    out.push(InputEvent::Sample(PointerSample {
                        device,
                        contact: ContactId(0),
                        phase,
                        timestamp_us,
                        x,
                        y,
                        pressure: pressure_supported.then(|| state.pressure.unwrap_or(0.0)),
                        tilt: tilt_supported.then(|| {
                            Tilt(state.tilt_x.unwrap_or(0.0), state.tilt_y.unwrap_or(0.0))
                        }),
                        contact_size: None,
                        tool: if state.rubber_in_range {
                            ToolHint::Eraser
                        } else {
                            ToolHint::Pen
                        },
                    }));
                }
                state.dirty = false;
            }
            Mode::MultiTouch { slots, .. } => {
                for slot in slots.iter_mut() {
                    let sample = |id: u32, phase: Phase, slot: &Slot| {
                        Some(InputEvent::Sample(PointerSample {
                            device,
                            contact: ContactId(id),
                            phase,
                            timestamp_us,
                            x: slot.x?,
                            y: slot.y?,
                            pressure: mt_pressure_supported.then(|| slot.pressure.unwrap_or(0.0)),
                            tilt: None,
                            contact_size: slot.size,
                            tool: ToolHint::Pen,
                        }))
                    };

                    match (slot.reported_id, slot.tracking_id) {
                        (None, Some(id)) => {
                            if let Some(event) = sample(id, Phase::Down, &*slot) {
                                out.push(event);
                                slot.reported_id = Some(id);
                            }
                        }
                        (Some(old), Some(new)) if old == new => {
                            if slot.dirty {
                                out.extend(sample(new, Phase::Move, &*slot));
                            }
                        }
                        (Some(old), Some(new)) => {
                            out.extend(sample(old, Phase::Up, &*slot));
                            slot.reported_id = None;
                            if let Some(event) = sample(new, Phase::Down, &*slot) {
                                out.push(event);
                                slot.reported_id = Some(new);
                            }
                        }
                        (Some(old), None) => {
                            out.extend(sample(old, Phase::Up, &*slot));
                            slot.reported_id = None;
                        }
                        (None, None) => {}
                    }
                    slot.dirty = false;
                }
            }
        }

        let emitted = out
            .iter()
            .filter(|event| matches!(event, InputEvent::Sample(_)))
            .count() as u64;
        self.stats.samples.fetch_add(emitted, Ordering::Relaxed);
        out
    }
}
