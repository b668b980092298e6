//! Palm rejection arbiter.
//!
//! Decides per contact whether input is drawing or incidental palm contact.
//! Stylus input is always accepted and opens a rolling window during which new
//! touch contacts are vetoed. Touch contacts outside that window are held back
//! for a short confirmation delay and rejected outright when their reported
//! area looks like a palm. A touch contact accepted shortly before the stylus
//! landed on top of it is retracted once; that is the only verdict that can
//! flip after it was reached.
//!
//! The arbiter only decides. Stroke building and history live in
//! [`crate::engine`], which consumes the returned [`Decision`]s in order.

mod contact;
mod window;

#[cfg(test)]
mod tests;

pub use contact::{Contact, RejectReason, Verdict};
pub use window::StylusWindow;

use crate::config::PalmRejectionConfig;
use crate::device::{DeviceId, DeviceKind};
use crate::input::events::{ContactKey, InputEvent, Phase, PointerSample};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap};

/// Tunables for the arbiter, in microseconds and canvas units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterSettings {
    /// Rolling stylus-activity window
    pub window_us: u64,
    /// How long a touch contact stays pending before it is accepted
    pub confirmation_delay_us: u64,
    /// Contact size above which a touch is treated as a palm
    pub palm_size_threshold: f64,
    /// Distance around a touch contact's region that counts as overlapping a stylus
    pub overlap_radius: f64,
    /// Whether a hovering stylus keeps the window open
    pub hover_counts_as_activity: bool,
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self::from_config(&PalmRejectionConfig::default())
    }
}

impl ArbiterSettings {
    pub fn from_config(config: &PalmRejectionConfig) -> Self {
        Self {
            window_us: config.window_ms * 1_000,
            confirmation_delay_us: config.confirmation_delay_ms * 1_000,
            palm_size_threshold: config.palm_size_threshold,
            overlap_radius: config.overlap_radius,
            hover_counts_as_activity: config.hover_counts_as_activity,
        }
    }
}

/// What the engine should do with a contact.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Feed these samples, in order, into the contact's stroke
    Forward {
        key: ContactKey,
        samples: Vec<PointerSample>,
    },
    /// Pending contact suppressed; it never produced samples
    Rejected {
        key: ContactKey,
        reason: RejectReason,
    },
    /// Accepted touch contact vetoed by the stylus; drop its stroke silently
    Retracted { key: ContactKey },
    /// Accepted contact lifted. Provisional strokes wait for `Settled`.
    Ended { key: ContactKey, provisional: bool },
    /// A provisional contact outlived the window and may be committed
    Settled { key: ContactKey },
    /// Contact replaced or cut short before it could finish
    Aborted { key: ContactKey },
}

impl Decision {
    pub fn key(&self) -> ContactKey {
        match self {
            Decision::Forward { key, .. }
            | Decision::Rejected { key, .. }
            | Decision::Retracted { key }
            | Decision::Ended { key, .. }
            | Decision::Settled { key }
            | Decision::Aborted { key } => *key,
        }
    }
}

/// Counters for callers that want to surface palm rejection activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbiterStats {
    pub accepted: u64,
    /// Touch contacts accepted at lift before their delay elapsed
    pub taps: u64,
    pub rejected_stylus_active: u64,
    pub rejected_palm_size: u64,
    pub retracted: u64,
    pub aborted: u64,
}

enum Standing {
    Pending,
    Accepted,
    Rejected,
}

/// The palm rejection state machine. Single-threaded; owned by the engine.
pub struct PalmArbiter {
    settings: ArbiterSettings,
    devices: HashMap<DeviceId, DeviceKind>,
    contacts: BTreeMap<ContactKey, Contact>,
    window: StylusWindow,
    stats: ArbiterStats,
}

impl PalmArbiter {
    pub fn new(settings: ArbiterSettings) -> Self {
        Self {
            window: StylusWindow::new(settings.window_us, settings.hover_counts_as_activity),
            settings,
            devices: HashMap::new(),
            contacts: BTreeMap::new(),
            stats: ArbiterStats::default(),
        }
    }

    pub fn settings(&self) -> &ArbiterSettings {
        &self.settings
    }

    /// Registers a device's classification. Unregistered devices count as Unknown.
    pub fn register_device(&mut self, device: DeviceId, kind: DeviceKind) {
        self.devices.insert(device, kind);
    }

    pub fn device_kind(&self, device: DeviceId) -> DeviceKind {
        self.devices
            .get(&device)
            .copied()
            .unwrap_or(DeviceKind::Unknown)
    }

    pub fn stats(&self) -> ArbiterStats {
        self.stats
    }

    pub fn contact(&self, key: ContactKey) -> Option<&Contact> {
        self.contacts.get(&key)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn stylus_active(&self, now_us: u64) -> bool {
        self.window.is_active(now_us)
    }

    /// Processes one normalized event.
    pub fn handle(&mut self, event: &InputEvent) -> Vec<Decision> {
        match *event {
            InputEvent::Sample(sample) => self.on_sample(sample),
            InputEvent::Proximity {
                device,
                timestamp_us,
                in_range,
            } => {
                let mut out = Vec::new();
                if self.device_kind(device) == DeviceKind::Stylus {
                    trace!("{} proximity in_range={}", device, in_range);
                    self.window.hover(device, in_range, timestamp_us);
                }
                self.settle(timestamp_us, &mut out);
                out
            }
        }
    }

    /// Resolves time-based transitions with no new samples: pending touch
    /// contacts whose delay elapsed, and provisional contacts whose window closed.
    pub fn tick(&mut self, now_us: u64) -> Vec<Decision> {
        let mut out = Vec::new();
        self.settle(now_us, &mut out);

        let pending: Vec<ContactKey> = self
            .contacts
            .values()
            .filter(|contact| contact.is_pending() && contact.kind == DeviceKind::Touch)
            .map(|contact| contact.key)
            .collect();

        let stylus_active = self.window.is_active(now_us);
        for key in pending {
            let Some(contact) = self.contacts.get_mut(&key) else {
                continue;
            };
            if stylus_active {
                contact.reject(RejectReason::StylusActive);
                self.stats.rejected_stylus_active += 1;
                debug!("{} rejected on tick: stylus active", key);
                out.push(Decision::Rejected {
                    key,
                    reason: RejectReason::StylusActive,
                });
            } else if now_us.saturating_sub(contact.first_seen_us)
                >= self.settings.confirmation_delay_us
            {
                if let Some(samples) = contact.accept() {
                    self.stats.accepted += 1;
                    debug!("{} accepted after confirmation delay", key);
                    out.push(Decision::Forward { key, samples });
                }
            }
        }
        out
    }

    /// Forgets a contact without finishing it.
    pub fn abort_contact(&mut self, key: ContactKey) -> bool {
        self.window.forget_contact(key);
        let removed = self.contacts.remove(&key).is_some();
        if removed {
            self.stats.aborted += 1;
            debug!("{} aborted", key);
        }
        removed
    }

    /// Forgets every contact of a device and the device itself. Returns the
    /// keys of the contacts that were dropped.
    pub fn abort_device(&mut self, device: DeviceId) -> Vec<ContactKey> {
        let keys: Vec<ContactKey> = self
            .contacts
            .keys()
            .filter(|key| key.device == device)
            .copied()
            .collect();
        for key in &keys {
            self.contacts.remove(key);
        }
        self.stats.aborted += keys.len() as u64;
        self.window.forget(device);
        self.devices.remove(&device);
        debug!("{} removed with {} live contact(s)", device, keys.len());
        keys
    }

    /// Ends the session: accepted contacts end, provisional ones settle,
    /// pending ones are dropped.
    pub fn finish(&mut self) -> Vec<Decision> {
        let mut out = Vec::new();
        for (key, contact) in std::mem::take(&mut self.contacts) {
            self.window.forget_contact(key);
            if contact.ended {
                out.push(Decision::Settled { key });
            } else if contact.is_accepted() {
                out.push(Decision::Ended {
                    key,
                    provisional: false,
                });
            } else if contact.is_pending() {
                self.stats.aborted += 1;
                out.push(Decision::Aborted { key });
            }
        }
        out
    }

    fn on_sample(&mut self, sample: PointerSample) -> Vec<Decision> {
        let mut out = Vec::new();
        let key = sample.key();
        let t = sample.timestamp_us;
        self.settle(t, &mut out);

        if let Some(existing) = self.contacts.get(&key) {
            if existing.ended {
                // A new engagement on the same key settles the lingering one.
                self.contacts.remove(&key);
                out.push(Decision::Settled { key });
            } else if sample.phase == Phase::Down {
                debug!("{} went down again while live; aborting the old contact", key);
                self.contacts.remove(&key);
                self.window.forget_contact(key);
                self.stats.aborted += 1;
                out.push(Decision::Aborted { key });
            }
        }

        if !self.contacts.contains_key(&key) {
            if sample.phase == Phase::Up {
                trace!("{} lifted without a known contact; ignoring", key);
                return out;
            }
            let kind = self.device_kind(sample.device);
            self.contacts.insert(key, Contact::begin(kind, &sample));
        }

        let Some(contact) = self.contacts.get_mut(&key) else {
            return out;
        };
        contact.observe(&sample);
        let standing = if contact.is_pending() {
            Standing::Pending
        } else if contact.is_accepted() {
            Standing::Accepted
        } else {
            Standing::Rejected
        };

        match standing {
            Standing::Rejected => {
                if sample.phase == Phase::Up {
                    self.contacts.remove(&key);
                }
            }
            Standing::Accepted => {
                if contact.kind == DeviceKind::Stylus {
                    self.window.touch(key, t, sample.phase != Phase::Up);
                }
                out.push(Decision::Forward {
                    key,
                    samples: vec![sample],
                });
                if sample.phase == Phase::Up {
                    self.end_accepted(key, t, &mut out);
                }
            }
            Standing::Pending => self.evaluate_pending(key, sample, &mut out),
        }
        out
    }

    fn evaluate_pending(&mut self, key: ContactKey, sample: PointerSample, out: &mut Vec<Decision>) {
        let t = sample.timestamp_us;
        let is_up = sample.phase == Phase::Up;
        let stylus_active = self.window.is_active(t);
        let Some(contact) = self.contacts.get_mut(&key) else {
            return;
        };

        let kind = contact.kind;
        let rejection = match kind {
            DeviceKind::Touch if stylus_active => Some(RejectReason::StylusActive),
            DeviceKind::Touch
                if sample
                    .contact_size
                    .is_some_and(|size| size > self.settings.palm_size_threshold) =>
            {
                Some(RejectReason::PalmSize)
            }
            _ => None,
        };

        if let Some(reason) = rejection {
            contact.reject(reason);
            match reason {
                RejectReason::PalmSize => self.stats.rejected_palm_size += 1,
                _ => self.stats.rejected_stylus_active += 1,
            }
            debug!("{} rejected: {}", key, reason.as_str());
            out.push(Decision::Rejected { key, reason });
            if is_up {
                self.contacts.remove(&key);
            }
            return;
        }

        let confirmed = match kind {
            DeviceKind::Touch => {
                let elapsed = t.saturating_sub(contact.first_seen_us);
                let confirmed = elapsed >= self.settings.confirmation_delay_us;
                if !confirmed && is_up {
                    self.stats.taps += 1;
                }
                confirmed || is_up
            }
            DeviceKind::Stylus | DeviceKind::Mouse | DeviceKind::Unknown => true,
        };

        if !confirmed {
            contact.buffer(sample);
            return;
        }

        let Some(mut samples) = contact.accept() else {
            return;
        };
        samples.push(sample);
        self.stats.accepted += 1;
        debug!("{} accepted ({})", key, kind);

        if kind == DeviceKind::Stylus {
            self.window.touch(key, t, !is_up);
            self.retract_overlapping(sample.x, sample.y, t, out);
        }

        out.push(Decision::Forward { key, samples });
        if is_up {
            self.end_accepted(key, t, out);
        }
    }

    /// Stylus override: flips accepted touch contacts under the stylus that
    /// began within the window.
    fn retract_overlapping(&mut self, x: f64, y: f64, t: u64, out: &mut Vec<Decision>) {
        let window_us = self.settings.window_us;
        let radius = self.settings.overlap_radius;
        let victims: Vec<ContactKey> = self
            .contacts
            .values()
            .filter(|contact| {
                contact.kind == DeviceKind::Touch
                    && contact.is_accepted()
                    && t.saturating_sub(contact.first_seen_us) <= window_us
                    && contact.bounds.inflate(radius).contains(x, y)
            })
            .map(|contact| contact.key)
            .collect();

        for key in victims {
            let Some(contact) = self.contacts.get_mut(&key) else {
                continue;
            };
            if contact.retract() {
                self.stats.retracted += 1;
                debug!("{} retracted: stylus landed on it", key);
                if contact.ended {
                    self.contacts.remove(&key);
                }
                out.push(Decision::Retracted { key });
            }
        }
    }

    fn end_accepted(&mut self, key: ContactKey, t: u64, out: &mut Vec<Decision>) {
        let window_us = self.settings.window_us;
        let Some(contact) = self.contacts.get_mut(&key) else {
            return;
        };

        let provisional = contact.kind == DeviceKind::Touch
            && t.saturating_sub(contact.first_seen_us) <= window_us;
        if provisional {
            contact.ended = true;
        } else {
            self.contacts.remove(&key);
        }
        out.push(Decision::Ended { key, provisional });
    }

    fn settle(&mut self, now_us: u64, out: &mut Vec<Decision>) {
        let window_us = self.settings.window_us;
        let settled: Vec<ContactKey> = self
            .contacts
            .values()
            .filter(|contact| {
                contact.ended && now_us.saturating_sub(contact.first_seen_us) > window_us
            })
            .map(|contact| contact.key)
            .collect();

        for key in settled {
            self.contacts.remove(&key);
            trace!("{} settled", key);
            out.push(Decision::Settled { key });
        }
    }
}
