//! Dirty region tracking for incremental rendering.
//!
//! Collects canvas regions that consumers need to repaint after strokes were
//! added, removed, previewed or retracted.

use super::stroke::Stroke;
use crate::util::Bounds;

/// Past this many pending regions the tracker collapses to a full repaint, so
/// it stays bounded when nobody drains it.
const MAX_REGIONS: usize = 256;

/// Tracks dirty regions accumulated between renders.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    regions: Vec<Bounds>,
    force_full: bool,
}

impl DirtyTracker {
    /// Creates a new, empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the entire canvas as dirty. Clears any accumulated regions.
    pub fn mark_full(&mut self) {
        self.force_full = true;
        self.regions.clear();
    }

    /// Adds a dirty region if the tracker is not already full.
    pub fn mark_bounds(&mut self, bounds: Bounds) {
        if self.force_full || !bounds.width().is_finite() || !bounds.height().is_finite() {
            return;
        }
        if self.regions.len() >= MAX_REGIONS {
            self.mark_full();
            return;
        }
        self.regions.push(bounds);
    }

    /// Adds a dirty region when present.
    pub fn mark_optional(&mut self, bounds: Option<Bounds>) {
        if let Some(bounds) = bounds {
            self.mark_bounds(bounds);
        }
    }

    /// Adds the area covered by a stroke.
    pub fn mark_stroke(&mut self, stroke: &Stroke) {
        self.mark_optional(stroke.bounds());
    }

    pub fn is_clean(&self) -> bool {
        !self.force_full && self.regions.is_empty()
    }

    /// Drains the dirty regions gathered so far.
    ///
    /// When the full canvas is marked, returns a single region covering the
    /// whole `width` x `height` canvas; otherwise returns accumulated regions.
    pub fn take_regions(&mut self, width: f64, height: f64) -> Vec<Bounds> {
        if self.force_full {
            self.force_full = false;
            self.regions.clear();
            if width > 0.0 && height > 0.0 {
                let mut full = Bounds::from_point(0.0, 0.0);
                full.include(width, height);
                return vec![full];
            }
            Vec::new()
        } else {
            self.regions.drain(..).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{StrokePoint, ToolDescriptor};
    use chrono::Utc;

    fn stroke() -> Stroke {
        Stroke::new(
            ToolDescriptor::default(),
            vec![
                StrokePoint {
                    x: 0.0,
                    y: 0.0,
                    pressure: None,
                    tilt: None,
                    width: 2.0,
                    elapsed_us: 0,
                },
                StrokePoint {
                    x: 10.0,
                    y: 10.0,
                    pressure: None,
                    tilt: None,
                    width: 2.0,
                    elapsed_us: 5,
                },
            ],
            Utc::now(),
        )
    }

    #[test]
    fn mark_stroke_records_regions() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_stroke(&stroke());

        let regions = tracker.take_regions(100.0, 100.0);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].width() > 10.0);
        assert!(tracker.is_clean());
    }

    #[test]
    fn undrained_regions_collapse_to_full() {
        let mut tracker = DirtyTracker::new();
        for _ in 0..=MAX_REGIONS {
            tracker.mark_stroke(&stroke());
        }

        let regions = tracker.take_regions(300.0, 200.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].max_x, 300.0);
    }

    #[test]
    fn mark_full_takes_precedence() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_stroke(&stroke());
        tracker.mark_full();
        tracker.mark_stroke(&stroke());

        let regions = tracker.take_regions(200.0, 100.0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].max_x, 200.0);
        assert_eq!(regions[0].max_y, 100.0);
    }
}
