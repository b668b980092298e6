//! Capability-based device classification.

use super::{Capabilities, DeviceKind};

/// Classifies a device from its advertised capabilities.
///
/// - Stylus: a pen/rubber tool or barrel button, or a single-contact pressure axis
/// - Touch: multi-contact position axes without stylus buttons
/// - Mouse: relative motion or pointer buttons
/// - Unknown: anything else, including unreadable capabilities
///
/// Touchscreens commonly mirror contact pressure on `ABS_PRESSURE`, so a
/// pressure axis only marks a stylus when the device is not multi-touch.
pub fn classify(capabilities: Option<&Capabilities>) -> DeviceKind {
    let Some(caps) = capabilities else {
        return DeviceKind::Unknown;
    };

    if caps.has_stylus_tool() {
        return DeviceKind::Stylus;
    }

    if caps.is_multi_touch() {
        return DeviceKind::Touch;
    }

    if caps.has_pressure() {
        return DeviceKind::Stylus;
    }

    if caps.relative_motion || caps.pointer_buttons {
        return DeviceKind::Mouse;
    }

    DeviceKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::AxisRange;
    use crate::device::codes::*;

    fn axis() -> Option<AxisRange> {
        Some(AxisRange::new(0, 4095))
    }

    #[test]
    fn pen_tool_marks_stylus() {
        let caps = Capabilities {
            pen_tool: true,
            abs_x: axis(),
            abs_y: axis(),
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Stylus);
    }

    #[test]
    fn rubber_tool_alone_marks_stylus() {
        let caps = Capabilities {
            eraser_tool: true,
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Stylus);
    }

    #[test]
    fn pressure_axis_marks_stylus() {
        let caps = Capabilities {
            abs_x: axis(),
            abs_y: axis(),
            pressure: Some(AxisRange::new(0, 1023)),
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Stylus);
    }

    #[test]
    fn multitouch_without_stylus_buttons_is_touch() {
        let caps = Capabilities {
            touch_button: true,
            mt_slot: Some(AxisRange::new(0, 9)),
            mt_x: axis(),
            mt_y: axis(),
            pressure: Some(AxisRange::new(0, 255)),
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Touch);
    }

    #[test]
    fn multitouch_with_pen_tool_is_stylus() {
        let caps = Capabilities {
            pen_tool: true,
            mt_x: axis(),
            mt_y: axis(),
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Stylus);
    }

    #[test]
    fn relative_pointer_is_mouse() {
        let caps = Capabilities {
            relative_motion: true,
            pointer_buttons: true,
            ..Default::default()
        };
        assert_eq!(classify(Some(&caps)), DeviceKind::Mouse);
    }

    #[test]
    fn advertised_bits_classify_without_ranges() {
        let touch = Capabilities {
            touch_button: true,
            abs_axes: (1u64 << ABS_MT_SLOT) | (1u64 << ABS_MT_POSITION_X) | (1u64 << ABS_PRESSURE),
            ..Default::default()
        };
        assert_eq!(classify(Some(&touch)), DeviceKind::Touch);

        let pen = Capabilities {
            abs_axes: (1u64 << ABS_X) | (1u64 << ABS_Y) | (1u64 << ABS_PRESSURE),
            ..Default::default()
        };
        assert_eq!(classify(Some(&pen)), DeviceKind::Stylus);
    }

    #[test]
    fn unreadable_or_empty_is_unknown() {
        assert_eq!(classify(None), DeviceKind::Unknown);
        assert_eq!(
            classify(Some(&Capabilities::default())),
            DeviceKind::Unknown
        );
    }
}
