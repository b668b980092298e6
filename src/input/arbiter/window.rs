//! Rolling window of stylus activity.

use crate::device::DeviceId;
use crate::input::events::ContactKey;
use std::collections::HashSet;

/// Tracks whether any stylus has been active recently.
///
/// The stylus counts as active while one of its contacts is down, while it
/// hovers in proximity (when enabled), and for `window_us` after either ends.
#[derive(Debug, Clone)]
pub struct StylusWindow {
    window_us: u64,
    hover_counts: bool,
    down: HashSet<ContactKey>,
    hovering: HashSet<DeviceId>,
    last_activity_us: Option<u64>,
}

impl StylusWindow {
    pub fn new(window_us: u64, hover_counts: bool) -> Self {
        Self {
            window_us,
            hover_counts,
            down: HashSet::new(),
            hovering: HashSet::new(),
            last_activity_us: None,
        }
    }

    pub fn window_us(&self) -> u64 {
        self.window_us
    }

    /// Records an accepted stylus sample.
    pub fn touch(&mut self, key: ContactKey, timestamp_us: u64, down: bool) {
        if down {
            self.down.insert(key);
        } else {
            self.down.remove(&key);
        }
        self.note(timestamp_us);
    }

    pub fn hover(&mut self, device: DeviceId, in_range: bool, timestamp_us: u64) {
        if !self.hover_counts {
            return;
        }
        if in_range {
            self.hovering.insert(device);
        } else {
            self.hovering.remove(&device);
        }
        self.note(timestamp_us);
    }

    /// Drops all state held for a device (disconnect).
    pub fn forget(&mut self, device: DeviceId) {
        self.down.retain(|key| key.device != device);
        self.hovering.remove(&device);
    }

    pub fn forget_contact(&mut self, key: ContactKey) {
        self.down.remove(&key);
    }

    /// Whether stylus activity falls within the window ending at `now_us`.
    ///
    /// The boundary is inclusive: activity exactly `window_us` ago still counts.
    pub fn is_active(&self, now_us: u64) -> bool {
        if !self.down.is_empty() || !self.hovering.is_empty() {
            return true;
        }
        self.last_activity_us
            .is_some_and(|last| now_us.saturating_sub(last) <= self.window_us)
    }

    fn note(&mut self, timestamp_us: u64) {
        self.last_activity_us = Some(
            self.last_activity_us
                .map_or(timestamp_us, |last| last.max(timestamp_us)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000;

    #[test]
    fn inactive_until_first_stylus_sample() {
        let window = StylusWindow::new(500 * MS, true);
        assert!(!window.is_active(0));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let mut window = StylusWindow::new(500 * MS, true);
        let key = ContactKey::new(DeviceId(1), 0);
        window.touch(key, 0, true);
        window.touch(key, 0, false);

        assert!(window.is_active(499 * MS));
        assert!(window.is_active(500 * MS));
        assert!(!window.is_active(501 * MS));
    }

    #[test]
    fn held_stylus_stays_active() {
        let mut window = StylusWindow::new(500 * MS, true);
        window.touch(ContactKey::new(DeviceId(1), 0), 0, true);
        assert!(window.is_active(10_000 * MS));
    }

    #[test]
    fn hover_is_ignored_when_disabled() {
        let mut window = StylusWindow::new(500 * MS, false);
        window.hover(DeviceId(1), true, 0);
        assert!(!window.is_active(0));

        let mut window = StylusWindow::new(500 * MS, true);
        window.hover(DeviceId(1), true, 0);
        assert!(window.is_active(5_000 * MS));
        window.hover(DeviceId(1), false, 5_000 * MS);
        assert!(window.is_active(5_400 * MS));
        assert!(!window.is_active(5_501 * MS));
    }

    #[test]
    fn forgetting_device_releases_held_contact() {
        let mut window = StylusWindow::new(500 * MS, true);
        window.touch(ContactKey::new(DeviceId(1), 0), 0, true);
        window.forget(DeviceId(1));
        assert!(!window.is_active(600 * MS));
    }
}
