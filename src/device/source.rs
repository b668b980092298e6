//! Input source abstraction consumed by the capture runner.

use super::InputDevice;
use crate::input::RawEvent;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering or reading devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("device {path} disconnected")]
    Disconnected { path: PathBuf },

    #[error("failed to scan input devices in {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Something that can enumerate input devices and open their event streams.
pub trait InputSource: Send + Sync {
    /// Enumerates and classifies the currently attached devices.
    fn list_devices(&self) -> Result<Vec<InputDevice>, DeviceError>;

    /// Opens the raw event stream for a device.
    ///
    /// Returns [`DeviceError::Unavailable`] when access is denied; callers log
    /// it and continue with the remaining devices.
    fn open(&self, device: &InputDevice) -> Result<Box<dyn EventStream>, DeviceError>;
}

/// A blocking stream of raw events from one device.
pub trait EventStream: Send {
    /// Blocks until the next raw event is available.
    ///
    /// Returns [`DeviceError::Disconnected`] once the device is gone.
    fn next_event(&mut self) -> Result<RawEvent, DeviceError>;
}
