//! Raw and normalized input event types.

use crate::device::{DeviceId, codes};

/// A raw, device-specific event record as read from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Kernel timestamp in microseconds
    pub timestamp_us: u64,
    pub kind: RawEventKind,
}

/// Decoded evdev record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// EV_KEY (button press/release; autorepeat counts as pressed)
    Key { code: u16, pressed: bool },
    /// EV_ABS
    Abs { axis: u16, value: i32 },
    /// EV_REL
    Rel { axis: u16, delta: i32 },
    /// SYN_REPORT: end of one hardware frame
    SyncReport,
    /// SYN_DROPPED: the kernel buffer overflowed and events were lost
    SyncDropped,
    /// Anything the pipeline does not interpret (EV_MSC, EV_LED, ...)
    Other { kind: u16, code: u16 },
}

impl RawEvent {
    pub fn new(timestamp_us: u64, kind: RawEventKind) -> Self {
        Self { timestamp_us, kind }
    }

    /// Decodes a `struct input_event` triple.
    pub fn from_evdev(timestamp_us: u64, kind: u16, code: u16, value: i32) -> Self {
        let kind = match (kind, code) {
            (codes::EV_KEY, code) => RawEventKind::Key {
                code,
                pressed: value != 0,
            },
            (codes::EV_ABS, axis) => RawEventKind::Abs { axis, value },
            (codes::EV_REL, axis) => RawEventKind::Rel { axis, delta: value },
            (codes::EV_SYN, codes::SYN_REPORT) => RawEventKind::SyncReport,
            (codes::EV_SYN, codes::SYN_DROPPED) => RawEventKind::SyncDropped,
            (kind, code) => RawEventKind::Other { kind, code },
        };
        Self { timestamp_us, kind }
    }
}

/// Identifies one simultaneous contact on a device (MT tracking id, or 0 for
/// single-contact devices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

/// A contact is uniquely identified by its device and contact id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactKey {
    pub device: DeviceId,
    pub contact: ContactId,
}

impl ContactKey {
    pub fn new(device: DeviceId, contact: u32) -> Self {
        Self {
            device,
            contact: ContactId(contact),
        }
    }
}

impl std::fmt::Display for ContactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.device, self.contact.0)
    }
}

/// Lifecycle phase of a sample within its contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Down,
    Move,
    Up,
}

/// Which end of the stylus produced the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolHint {
    #[default]
    Pen,
    /// Stylus rubber end (BTN_TOOL_RUBBER)
    Eraser,
}

/// Stylus tilt angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tilt(pub f64, pub f64);

impl Tilt {
    /// Tilt magnitude in degrees.
    pub fn magnitude(&self) -> f64 {
        (self.0 * self.0 + self.1 * self.1).sqrt()
    }
}

/// Unified, device-independent pointer sample in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub device: DeviceId,
    pub contact: ContactId,
    pub phase: Phase,
    /// Monotonic timestamp in microseconds, non-decreasing per device
    pub timestamp_us: u64,
    pub x: f64,
    pub y: f64,
    /// 0.0-1.0, `None` when the device has no pressure axis
    pub pressure: Option<f64>,
    /// `None` when the device has no tilt axes
    pub tilt: Option<Tilt>,
    /// Contact diameter in canvas units when the device reports it
    pub contact_size: Option<f64>,
    pub tool: ToolHint,
}

impl PointerSample {
    pub fn key(&self) -> ContactKey {
        ContactKey {
            device: self.device,
            contact: self.contact,
        }
    }
}

/// Output of the event normalizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Sample(PointerSample),
    /// Stylus entered or left hover range
    Proximity {
        device: DeviceId,
        timestamp_us: u64,
        in_range: bool,
    },
}

impl InputEvent {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            InputEvent::Sample(sample) => sample.timestamp_us,
            InputEvent::Proximity { timestamp_us, .. } => *timestamp_us,
        }
    }

    pub fn device(&self) -> DeviceId {
        match self {
            InputEvent::Sample(sample) => sample.device,
            InputEvent::Proximity { device, .. } => *device,
        }
    }
}
