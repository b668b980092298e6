//! Stroke builder: accepted samples of one contact to a committed [`Stroke`].

use super::stroke::{Stroke, StrokePoint, ToolDescriptor, ToolKind};
use crate::config::StrokeConfig;
use crate::input::{PointerSample, Tilt};
use crate::util::Bounds;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Narrowest width any tool draws, so zero pressure still leaves a mark.
pub const MIN_WIDTH: f64 = 0.5;
/// Largest supported moving-average window.
pub const MAX_SMOOTHING: usize = 3;

const PENCIL_FACTOR: f64 = 0.8;
const PENCIL_MAX_TILT_GAIN: f64 = 1.5;
/// Tilt at which the pencil reaches its widest line, in degrees.
const PENCIL_FULL_TILT: f64 = 60.0;
const HIGHLIGHTER_FACTOR: f64 = 2.5;

/// Pressure-to-width mapping.
///
/// `width = base * tool_factor * (floor + (1 - floor) * pressure^gamma)`,
/// monotonic in pressure for any positive gamma.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureCurve {
    /// Fraction of the base width drawn at zero pressure
    pub min_width_factor: f64,
    pub gamma: f64,
    /// Pressure assumed for devices that report none
    pub default_pressure: f64,
}

impl Default for PressureCurve {
    fn default() -> Self {
        Self {
            min_width_factor: 0.15,
            gamma: 1.0,
            default_pressure: 1.0,
        }
    }
}

impl PressureCurve {
    pub fn from_config(config: &StrokeConfig) -> Self {
        Self {
            min_width_factor: config.min_width_factor,
            gamma: config.pressure_gamma,
            default_pressure: config.default_pressure,
        }
    }

    /// Width for one sample drawn with `tool`.
    pub fn width(&self, tool: &ToolDescriptor, pressure: Option<f64>, tilt: Option<Tilt>) -> f64 {
        let base = tool.width_base;
        let pressure = pressure.unwrap_or(self.default_pressure).clamp(0.0, 1.0);
        let floor = self.min_width_factor.clamp(0.0, 1.0);
        let scale = floor + (1.0 - floor) * pressure.powf(self.gamma);

        let width = match tool.kind {
            ToolKind::Pen => base * scale,
            ToolKind::Pencil => {
                let lean = tilt.map_or(0.0, |t| (t.magnitude() / PENCIL_FULL_TILT).min(1.0));
                base * PENCIL_FACTOR * scale * (1.0 + (PENCIL_MAX_TILT_GAIN - 1.0) * lean)
            }
            ToolKind::Highlighter => base * HIGHLIGHTER_FACTOR,
            ToolKind::Eraser => base,
        };
        width.max(MIN_WIDTH)
    }
}

/// Accumulates one contact's accepted samples.
#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    tool: ToolDescriptor,
    curve: PressureCurve,
    smoothing: usize,
    created_at: DateTime<Utc>,
    start_us: Option<u64>,
    window: VecDeque<(f64, f64)>,
    points: Vec<StrokePoint>,
    last_raw: Option<StrokePoint>,
}

impl StrokeBuilder {
    /// `smoothing` is the moving-average window in samples, clamped to 1..=3
    /// (1 disables smoothing).
    pub fn new(tool: ToolDescriptor, curve: PressureCurve, smoothing: usize) -> Self {
        Self {
            tool,
            curve,
            smoothing: smoothing.clamp(1, MAX_SMOOTHING),
            created_at: Utc::now(),
            start_us: None,
            window: VecDeque::with_capacity(MAX_SMOOTHING),
            points: Vec::new(),
            last_raw: None,
        }
    }

    pub fn tool(&self) -> &ToolDescriptor {
        &self.tool
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[StrokePoint] {
        &self.points
    }

    /// Appends a sample and returns the point it produced.
    pub fn push(&mut self, sample: &PointerSample) -> StrokePoint {
        let start = *self.start_us.get_or_insert(sample.timestamp_us);
        let previous = self.points.last().map_or(0, |p| p.elapsed_us);
        let elapsed_us = sample.timestamp_us.saturating_sub(start).max(previous);

        if self.window.len() == self.smoothing {
            self.window.pop_front();
        }
        self.window.push_back((sample.x, sample.y));
        let n = self.window.len() as f64;
        let (sx, sy) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));

        let width = self.curve.width(&self.tool, sample.pressure, sample.tilt);
        let raw = StrokePoint {
            x: sample.x,
            y: sample.y,
            pressure: sample.pressure,
            tilt: sample.tilt,
            width,
            elapsed_us,
        };
        let point = StrokePoint {
            x: sx / n,
            y: sy / n,
            ..raw
        };
        self.points.push(point);
        self.last_raw = Some(raw);
        point
    }

    /// Region covered so far.
    pub fn bounds(&self) -> Option<Bounds> {
        let bounds = Bounds::from_points(self.points.iter().map(|p| (p.x, p.y)))?;
        let widest = self.points.iter().map(|p| p.width).fold(0.0, f64::max);
        Some(bounds.inflate(widest / 2.0))
    }

    /// Snapshot of the stroke in progress for previews.
    pub fn preview(&self) -> Option<Stroke> {
        if self.points.is_empty() {
            return None;
        }
        Some(Stroke::new(self.tool, self.points.clone(), self.created_at))
    }

    /// Finishes the stroke. Smoothing lags the pen, so the real lift point is
    /// appended when it differs from the last smoothed point.
    ///
    /// Returns `None` when no samples were accepted.
    pub fn finish(mut self) -> Option<Stroke> {
        let raw = self.last_raw?;
        if let Some(last) = self.points.last() {
            if last.x != raw.x || last.y != raw.y {
                self.points.push(raw);
            }
        }
        Some(Stroke::new(self.tool, self.points, self.created_at))
    }
}
