//! Eraser hit testing against committed strokes.

use super::page::{Page, StrokeId};
use super::stroke::{Stroke, StrokePoint};
use crate::util::{Bounds, distance_to_segment};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How an eraser pass affects the strokes it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EraserMode {
    /// Remove every stroke the eraser touches
    #[default]
    Stroke,
    /// Cut out only the touched points, keeping the remaining pieces
    Split,
}

/// One stroke affected by an eraser pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Erasure {
    pub id: StrokeId,
    /// Position of the stroke in the page before the pass
    pub index: usize,
    /// Surviving pieces (always empty in [`EraserMode::Stroke`])
    pub pieces: Vec<Stroke>,
}

/// Finds the strokes touched by an eraser dragged along `path`.
///
/// A point is hit when its line edge lies within `radius` of the path.
/// In split mode pieces shorter than two points are dropped. Results are in
/// page order.
pub fn erase(page: &Page, path: &[(f64, f64)], radius: f64, mode: EraserMode) -> Vec<Erasure> {
    let Some(path_bounds) = Bounds::from_points(path.iter().copied()) else {
        return Vec::new();
    };
    let reach = path_bounds.inflate(radius);

    page.iter()
        .enumerate()
        .filter(|(_, (_, stroke))| {
            stroke
                .bounds()
                .is_some_and(|bounds| bounds.intersects(&reach))
        })
        .filter_map(|(index, (id, stroke))| {
            let hits: Vec<bool> = stroke
                .points
                .iter()
                .map(|point| is_hit(point, path, radius))
                .collect();
            if !hits.iter().any(|hit| *hit) {
                return None;
            }

            let pieces = match mode {
                EraserMode::Stroke => Vec::new(),
                EraserMode::Split => split(stroke, &hits),
            };
            Some(Erasure { id, index, pieces })
        })
        .collect()
}

fn is_hit(point: &StrokePoint, path: &[(f64, f64)], radius: f64) -> bool {
    let reach = radius + point.width / 2.0;
    if let [(x, y)] = path {
        return distance_to_segment(point.x, point.y, *x, *y, *x, *y) <= reach;
    }
    path.windows(2).any(|segment| {
        let (ax, ay) = segment[0];
        let (bx, by) = segment[1];
        distance_to_segment(point.x, point.y, ax, ay, bx, by) <= reach
    })
}

fn split(stroke: &Stroke, hits: &[bool]) -> Vec<Stroke> {
    let mut pieces = Vec::new();
    let mut run: Vec<StrokePoint> = Vec::new();

    for (point, hit) in stroke.points.iter().zip(hits) {
        if *hit {
            if run.len() >= 2 {
                pieces.push(Stroke::new(stroke.tool, std::mem::take(&mut run), stroke.created_at));
            }
            run.clear();
        } else {
            run.push(*point);
        }
    }
    if run.len() >= 2 {
        pieces.push(Stroke::new(stroke.tool, run, stroke.created_at));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::ToolDescriptor;
    use chrono::Utc;
    use std::sync::Arc;

    fn line(y: f64, from: f64, to: f64) -> Stroke {
        let points = (from as i64..=to as i64)
            .step_by(10)
            .map(|x| StrokePoint {
                x: x as f64,
                y,
                pressure: Some(0.5),
                tilt: None,
                width: 2.0,
                elapsed_us: 0,
            })
            .collect();
        Stroke::new(ToolDescriptor::default(), points, Utc::now())
    }

    fn page() -> (Page, StrokeId, StrokeId) {
        let mut page = Page::new();
        let top = page.push(Arc::new(line(0.0, 0.0, 100.0)));
        let bottom = page.push(Arc::new(line(200.0, 0.0, 100.0)));
        (page, top, bottom)
    }

    #[test]
    fn stroke_mode_removes_whole_stroke() {
        let (page, top, _) = page();
        let hits = erase(&page, &[(50.0, -5.0), (50.0, 5.0)], 10.0, EraserMode::Stroke);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, top);
        assert_eq!(hits[0].index, 0);
        assert!(hits[0].pieces.is_empty());
    }

    #[test]
    fn split_mode_keeps_both_sides() {
        let (page, _, _) = page();
        let hits = erase(&page, &[(50.0, 0.0)], 5.0, EraserMode::Split);
        assert_eq!(hits.len(), 1);
        let pieces = &hits[0].pieces;
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].points.last().unwrap().x, 40.0);
        assert_eq!(pieces[1].points[0].x, 60.0);
    }

    #[test]
    fn split_mode_drops_single_point_leftovers() {
        let (page, _, _) = page();
        // Clears everything except x=0 on the top line.
        let hits = erase(&page, &[(10.0, 0.0), (100.0, 0.0)], 5.0, EraserMode::Split);
        assert!(hits[0].pieces.is_empty());
    }

    #[test]
    fn misses_leave_page_alone() {
        let (page, _, _) = page();
        assert!(erase(&page, &[(500.0, 500.0)], 20.0, EraserMode::Stroke).is_empty());
        assert!(erase(&page, &[], 20.0, EraserMode::Stroke).is_empty());
    }
}
