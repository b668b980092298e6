//! Input device discovery and classification.
//!
//! Devices are scanned once at startup. Each one gets a fixed [`Capabilities`]
//! descriptor and a [`DeviceKind`] tag that the rest of the pipeline treats as
//! authoritative for the device's lifetime.

pub mod classify;
pub mod codes;
pub mod evdev;
pub mod source;

use std::fmt;
use std::path::{Path, PathBuf};

pub use classify::classify;
pub use evdev::EvdevSource;
pub use source::{DeviceError, EventStream, InputSource};

/// Stable identifier for a discovered device (the evdev node number on Linux).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Classification tag assigned at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Pen/stylus digitizer; never palm-rejected
    Stylus,
    /// Multi-contact touchscreen; subject to palm rejection
    Touch,
    /// Relative pointer (mouse, touchpad in pointer mode)
    Mouse,
    /// Capabilities unreadable or unrecognised; always accepted
    Unknown,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Stylus => "stylus",
            DeviceKind::Touch => "touch",
            DeviceKind::Mouse => "mouse",
            DeviceKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advertised range of an absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
    /// Units per millimetre, or per radian for tilt axes; 0 when unreported
    pub resolution: i32,
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            resolution: 0,
        }
    }

    pub fn with_resolution(self, resolution: i32) -> Self {
        Self { resolution, ..self }
    }

    /// Converts a raw tilt value to degrees. Devices that report no
    /// resolution are taken to count in whole degrees.
    pub fn tilt_degrees(&self, value: i32) -> f64 {
        if self.resolution > 0 {
            (value as f64 / self.resolution as f64).to_degrees()
        } else {
            value as f64
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Width of the range; never zero so it can be used as a divisor.
    pub fn span(&self) -> f64 {
        (self.max as f64 - self.min as f64).max(1.0)
    }

    /// Maps `value` into `0.0..=1.0`, or `None` when it lies outside the range.
    pub fn normalize(&self, value: i32) -> Option<f64> {
        if !self.contains(value) {
            return None;
        }
        Some((value as f64 - self.min as f64) / self.span())
    }
}

/// Fixed capability descriptor populated once at discovery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    /// BTN_TOOL_PEN
    pub pen_tool: bool,
    /// BTN_TOOL_RUBBER (stylus eraser end)
    pub eraser_tool: bool,
    /// BTN_STYLUS / BTN_STYLUS2 barrel buttons
    pub stylus_buttons: bool,
    /// BTN_TOUCH
    pub touch_button: bool,
    /// BTN_LEFT / BTN_RIGHT / BTN_MIDDLE
    pub pointer_buttons: bool,
    /// REL_X and REL_Y
    pub relative_motion: bool,
    /// Bit per advertised ABS code. Known even when the ranges below are not,
    /// which happens when the device node cannot be opened.
    pub abs_axes: u64,
    pub abs_x: Option<AxisRange>,
    pub abs_y: Option<AxisRange>,
    pub pressure: Option<AxisRange>,
    pub tilt_x: Option<AxisRange>,
    pub tilt_y: Option<AxisRange>,
    pub mt_slot: Option<AxisRange>,
    pub mt_x: Option<AxisRange>,
    pub mt_y: Option<AxisRange>,
    pub mt_touch_major: Option<AxisRange>,
    pub mt_pressure: Option<AxisRange>,
    pub mt_tracking_id: Option<AxisRange>,
}

impl Capabilities {
    pub fn has_stylus_tool(&self) -> bool {
        self.pen_tool || self.eraser_tool || self.stylus_buttons
    }

    pub fn has_abs(&self, axis: u16) -> bool {
        axis < 64 && self.abs_axes & (1u64 << axis) != 0
    }

    pub fn is_multi_touch(&self) -> bool {
        self.mt_x.is_some()
            || self.mt_slot.is_some()
            || self.has_abs(codes::ABS_MT_POSITION_X)
            || self.has_abs(codes::ABS_MT_SLOT)
    }

    pub fn has_pressure(&self) -> bool {
        self.pressure.is_some() || self.has_abs(codes::ABS_PRESSURE)
    }

    pub fn supports_tilt(&self) -> bool {
        self.tilt_x.is_some() || self.tilt_y.is_some()
    }

    /// Returns the advertised range for an absolute axis code, if any.
    pub fn abs_range(&self, axis: u16) -> Option<AxisRange> {
        use codes::*;
        match axis {
            ABS_X => self.abs_x,
            ABS_Y => self.abs_y,
            ABS_PRESSURE => self.pressure,
            ABS_TILT_X => self.tilt_x,
            ABS_TILT_Y => self.tilt_y,
            ABS_MT_SLOT => self.mt_slot,
            ABS_MT_POSITION_X => self.mt_x,
            ABS_MT_POSITION_Y => self.mt_y,
            ABS_MT_TOUCH_MAJOR => self.mt_touch_major,
            ABS_MT_PRESSURE => self.mt_pressure,
            ABS_MT_TRACKING_ID => self.mt_tracking_id,
            _ => None,
        }
    }
}

/// A discovered input device. Immutable once classified.
#[derive(Debug, Clone)]
pub struct InputDevice {
    id: DeviceId,
    path: PathBuf,
    name: String,
    capabilities: Option<Capabilities>,
    kind: DeviceKind,
}

impl InputDevice {
    /// Builds a device record and classifies it from its capabilities.
    ///
    /// `capabilities` is `None` when the descriptor could not be read; such
    /// devices are classified [`DeviceKind::Unknown`].
    pub fn discovered(
        id: DeviceId,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        capabilities: Option<Capabilities>,
    ) -> Self {
        let kind = classify(capabilities.as_ref());
        Self {
            id,
            path: path.into(),
            name: name.into(),
            capabilities,
            kind,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Capability descriptor; empty for devices whose capabilities were unreadable.
    pub fn capabilities(&self) -> &Capabilities {
        static EMPTY: Capabilities = Capabilities {
            pen_tool: false,
            eraser_tool: false,
            stylus_buttons: false,
            touch_button: false,
            pointer_buttons: false,
            relative_motion: false,
            abs_axes: 0,
            abs_x: None,
            abs_y: None,
            pressure: None,
            tilt_x: None,
            tilt_y: None,
            mt_slot: None,
            mt_x: None,
            mt_y: None,
            mt_touch_major: None,
            mt_pressure: None,
            mt_tracking_id: None,
        };
        self.capabilities.as_ref().unwrap_or(&EMPTY)
    }

    pub fn capabilities_known(&self) -> bool {
        self.capabilities.is_some()
    }
}
