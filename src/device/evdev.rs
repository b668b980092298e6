//! Linux evdev input source (`/dev/input/event*`).
//!
//! Capability bitmasks come from sysfs; absolute axis ranges are queried with
//! `EVIOCGABS` on the device node. Event streams are plain blocking reads of
//! `struct input_event` records with the clock switched to `CLOCK_MONOTONIC`.

use super::codes::*;
use super::source::{DeviceError, EventStream, InputSource};
use super::{AxisRange, Capabilities, DeviceId, InputDevice};
use crate::input::RawEvent;
use log::{debug, info, warn};
use nix::{ioctl_write_ptr, request_code_read};
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

ioctl_write_ptr!(eviocsclockid, b'E', 0xa0, libc::c_int);

const EVENT_SIZE: usize = std::mem::size_of::<libc::input_event>();
const WORD_BITS: usize = std::mem::size_of::<libc::c_long>() * 8;

/// Device source backed by the kernel evdev interface.
#[derive(Debug, Clone)]
pub struct EvdevSource {
    input_dir: PathBuf,
    sysfs_dir: PathBuf,
}

impl Default for EvdevSource {
    fn default() -> Self {
        Self::new("/dev/input", "/sys/class/input")
    }
}

impl EvdevSource {
    pub fn new(input_dir: impl Into<PathBuf>, sysfs_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            sysfs_dir: sysfs_dir.into(),
        }
    }

    fn sysfs_device_dir(&self, node: &str) -> PathBuf {
        self.sysfs_dir.join(node).join("device")
    }

    fn describe(&self, node: &str, number: u32, path: PathBuf) -> InputDevice {
        let sys_dir = self.sysfs_device_dir(node);
        let name = fs::read_to_string(sys_dir.join("name"))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|_| node.to_string());

        let capabilities = match read_capabilities(&path, &sys_dir) {
            Ok(caps) => Some(caps),
            Err(err) => {
                debug!("Could not read capabilities of {}: {}", path.display(), err);
                None
            }
        };

        InputDevice::discovered(DeviceId(number), path, name, capabilities)
    }
}

impl InputSource for EvdevSource {
    fn list_devices(&self) -> Result<Vec<InputDevice>, DeviceError> {
        let entries = fs::read_dir(&self.input_dir).map_err(|source| DeviceError::Scan {
            path: self.input_dir.clone(),
            source,
        })?;

        let mut nodes: Vec<(u32, String)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let number = name.strip_prefix("event")?.parse::<u32>().ok()?;
                Some((number, name))
            })
            .collect();
        nodes.sort();

        let devices: Vec<InputDevice> = nodes
            .into_iter()
            .map(|(number, node)| {
                let path = self.input_dir.join(&node);
                let device = self.describe(&node, number, path);
                debug!(
                    "Discovered {} '{}' at {} ({})",
                    device.id(),
                    device.name(),
                    device.path().display(),
                    device.kind()
                );
                device
            })
            .collect();

        info!("Found {} input device(s)", devices.len());
        Ok(devices)
    }

    fn open(&self, device: &InputDevice) -> Result<Box<dyn EventStream>, DeviceError> {
        let path = device.path().to_path_buf();
        let file = File::open(&path).map_err(|source| DeviceError::Unavailable {
            path: path.clone(),
            source,
        })?;

        let clock: libc::c_int = libc::CLOCK_MONOTONIC;
        // SAFETY: EVIOCSCLOCKID reads one c_int from the pointer; the fd is open.
        if let Err(err) = unsafe { eviocsclockid(file.as_raw_fd(), &clock) } {
            warn!(
                "Could not switch {} to the monotonic clock ({}); timestamps will be clamped",
                path.display(),
                err
            );
        }

        Ok(Box::new(EvdevStream { file, path }))
    }
}

/// Blocking reader over one evdev node.
pub struct EvdevStream {
    file: File,
    path: PathBuf,
}

impl EventStream for EvdevStream {
    fn next_event(&mut self) -> Result<RawEvent, DeviceError> {
        let mut buf = [0u8; EVENT_SIZE];
        if let Err(err) = self.file.read_exact(&mut buf) {
            return Err(if is_disconnect(&err) {
                DeviceError::Disconnected {
                    path: self.path.clone(),
                }
            } else {
                DeviceError::Read {
                    path: self.path.clone(),
                    source: err,
                }
            });
        }

        // SAFETY: the kernel writes whole input_event records and buf holds exactly one.
        let event: libc::input_event = unsafe { std::ptr::read_unaligned(buf.as_ptr().cast()) };
        let micros = (event.time.tv_sec as i64)
            .saturating_mul(1_000_000)
            .saturating_add(event.time.tv_usec as i64);

        Ok(RawEvent::from_evdev(
            micros.max(0) as u64,
            event.type_,
            event.code,
            event.value,
        ))
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENODEV) || err.kind() == io::ErrorKind::UnexpectedEof
}

/// Reads the capability descriptor. The sysfs bitmasks alone decide the
/// device kind; the node is only opened for axis ranges, which stay `None`
/// when it is not readable.
fn read_capabilities(node: &Path, sys_dir: &Path) -> io::Result<Capabilities> {
    let caps_dir = sys_dir.join("capabilities");
    let keys = parse_bitmask(&fs::read_to_string(caps_dir.join("key"))?);
    let rel = parse_bitmask(&fs::read_to_string(caps_dir.join("rel")).unwrap_or_default());
    let abs = parse_bitmask(&fs::read_to_string(caps_dir.join("abs")).unwrap_or_default());

    let mut caps = Capabilities {
        pen_tool: has_bit(&keys, BTN_TOOL_PEN),
        eraser_tool: has_bit(&keys, BTN_TOOL_RUBBER),
        stylus_buttons: has_bit(&keys, BTN_STYLUS) || has_bit(&keys, BTN_STYLUS2),
        touch_button: has_bit(&keys, BTN_TOUCH),
        pointer_buttons: has_bit(&keys, BTN_LEFT)
            || has_bit(&keys, BTN_RIGHT)
            || has_bit(&keys, BTN_MIDDLE),
        relative_motion: has_bit(&rel, REL_X) && has_bit(&rel, REL_Y),
        abs_axes: (0..ABS_CNT)
            .filter(|axis| has_bit(&abs, *axis))
            .fold(0u64, |bits, axis| bits | (1u64 << axis)),
        ..Default::default()
    };

    if caps.abs_axes == 0 {
        return Ok(caps);
    }

    let file = match File::open(node) {
        Ok(file) => file,
        Err(err) => {
            debug!(
                "Axis ranges of {} unavailable ({}); classifying from sysfs only",
                node.display(),
                err
            );
            return Ok(caps);
        }
    };
    let fd = file.as_raw_fd();
    let bits = caps.abs_axes;
    let range = |axis: u16| {
        if bits & (1u64 << axis) != 0 {
            read_abs_range(fd, axis)
        } else {
            None
        }
    };

    caps.abs_x = range(ABS_X);
    caps.abs_y = range(ABS_Y);
    caps.pressure = range(ABS_PRESSURE);
    caps.tilt_x = range(ABS_TILT_X);
    caps.tilt_y = range(ABS_TILT_Y);
    caps.mt_slot = range(ABS_MT_SLOT);
    caps.mt_x = range(ABS_MT_POSITION_X);
    caps.mt_y = range(ABS_MT_POSITION_Y);
    caps.mt_touch_major = range(ABS_MT_TOUCH_MAJOR);
    caps.mt_pressure = range(ABS_MT_PRESSURE);
    caps.mt_tracking_id = range(ABS_MT_TRACKING_ID);

    Ok(caps)
}

fn read_abs_range(fd: RawFd, axis: u16) -> Option<AxisRange> {
    if axis >= ABS_CNT {
        return None;
    }
    // SAFETY: input_absinfo is a plain C struct of integers; all-zero is valid.
    let mut info: libc::input_absinfo = unsafe { std::mem::zeroed() };
    let request = request_code_read!(b'E', 0x40 + axis, std::mem::size_of::<libc::input_absinfo>());
    // SAFETY: EVIOCGABS writes exactly one input_absinfo into `info`.
    let rc = unsafe { libc::ioctl(fd, request, &mut info as *mut libc::input_absinfo) };
    (rc >= 0).then(|| AxisRange::new(info.minimum, info.maximum).with_resolution(info.resolution))
}

/// Parses a sysfs capability bitmask (hex words, most significant first).
fn parse_bitmask(text: &str) -> Vec<u64> {
    text.split_whitespace()
        .rev()
        .map(|word| u64::from_str_radix(word, 16).unwrap_or(0))
        .collect()
}

fn has_bit(words: &[u64], code: u16) -> bool {
    let code = code as usize;
    words
        .get(code / WORD_BITS)
        .is_some_and(|word| word & (1u64 << (code % WORD_BITS)) != 0)
}
