//! Committed ink strokes and their tool descriptors.

use super::color::{BLACK, Color, YELLOW};
use crate::input::Tilt;
use crate::util::Bounds;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Alpha applied to highlighter ink.
pub const HIGHLIGHTER_ALPHA: f64 = 0.4;

/// Drawing tool kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pen,
    Pencil,
    Highlighter,
    Eraser,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Pen => "pen",
            ToolKind::Pencil => "pencil",
            ToolKind::Highlighter => "highlighter",
            ToolKind::Eraser => "eraser",
        }
    }
}

/// Tool, ink and base width a stroke was drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "tool")]
    pub kind: ToolKind,
    pub color: Color,
    #[serde(rename = "widthBase")]
    pub width_base: f64,
}

impl Default for ToolDescriptor {
    fn default() -> Self {
        Self::new(ToolKind::Pen, BLACK, 3.0)
    }
}

impl ToolDescriptor {
    /// Highlighter ink is forced translucent.
    pub fn new(kind: ToolKind, color: Color, width_base: f64) -> Self {
        let color = match kind {
            ToolKind::Highlighter => color.with_alpha(HIGHLIGHTER_ALPHA),
            _ => color,
        };
        Self {
            kind,
            color,
            width_base,
        }
    }

    pub fn highlighter() -> Self {
        Self::new(ToolKind::Highlighter, YELLOW, 3.0)
    }

    pub fn is_eraser(&self) -> bool {
        self.kind == ToolKind::Eraser
    }
}

/// One recorded point of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// `None` when the device had no pressure axis; serialized as `null`
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt: Option<Tilt>,
    /// Rendered line width at this point; zero in files written without it
    #[serde(default)]
    pub width: f64,
    /// Microseconds since the stroke began
    #[serde(default, rename = "t")]
    pub elapsed_us: u64,
}

/// An immutable, committed stroke. Edits produce new strokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(flatten)]
    pub tool: ToolDescriptor,
    pub points: Vec<StrokePoint>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Stroke {
    pub fn new(tool: ToolDescriptor, points: Vec<StrokePoint>, created_at: DateTime<Utc>) -> Self {
        Self {
            tool,
            points,
            created_at,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn duration_us(&self) -> u64 {
        self.points.last().map_or(0, |point| point.elapsed_us)
    }

    /// Area covered by the stroke including half its widest line.
    pub fn bounds(&self) -> Option<Bounds> {
        let bounds = Bounds::from_points(self.points.iter().map(|p| (p.x, p.y)))?;
        let half_width = self
            .points
            .iter()
            .map(|p| p.width)
            .fold(self.tool.width_base, f64::max)
            / 2.0;
        Some(bounds.inflate(half_width))
    }

    /// A copy moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Stroke {
        Stroke {
            tool: self.tool,
            points: self
                .points
                .iter()
                .map(|p| StrokePoint {
                    x: p.x + dx,
                    y: p.y + dy,
                    ..*p
                })
                .collect(),
            created_at: self.created_at,
        }
    }

    /// Fills widths missing from older files with the base width.
    pub(crate) fn fill_missing_widths(&mut self) {
        let base = self.tool.width_base;
        for point in self.points.iter_mut().filter(|p| p.width <= 0.0) {
            point.width = base;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> StrokePoint {
        StrokePoint {
            x,
            y,
            pressure: None,
            tilt: None,
            width: 4.0,
            elapsed_us: 0,
        }
    }

    #[test]
    fn serialized_shape_matches_page_format() {
        let stroke = Stroke::new(
            ToolDescriptor::default(),
            vec![point(1.0, 2.0)],
            "2024-05-01T10:00:00Z".parse().unwrap(),
        );
        let value = serde_json::to_value(&stroke).unwrap();
        assert_eq!(value["tool"], "pen");
        assert_eq!(value["widthBase"], 3.0);
        assert_eq!(value["color"], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
        assert!(value["points"][0]["pressure"].is_null());
        assert!(value["points"][0].get("tilt").is_none());
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn highlighter_is_translucent() {
        let tool = ToolDescriptor::new(ToolKind::Highlighter, BLACK, 3.0);
        assert_eq!(tool.color.a, HIGHLIGHTER_ALPHA);
    }

    #[test]
    fn translated_keeps_original_untouched() {
        let stroke = Stroke::new(ToolDescriptor::default(), vec![point(1.0, 2.0)], Utc::now());
        let moved = stroke.translated(10.0, -2.0);
        assert_eq!(moved.points[0].x, 11.0);
        assert_eq!(moved.points[0].y, 0.0);
        assert_eq!(stroke.points[0].x, 1.0);
    }

    #[test]
    fn bounds_include_line_width() {
        let stroke = Stroke::new(
            ToolDescriptor::default(),
            vec![point(10.0, 10.0), point(20.0, 10.0)],
            Utc::now(),
        );
        let bounds = stroke.bounds().unwrap();
        assert_eq!(bounds.min_x, 8.0);
        assert_eq!(bounds.max_x, 22.0);
    }
}
