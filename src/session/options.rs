use crate::config::{CompressionSetting, PageConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES: u64 = 100 * 1024; // 100 KiB

/// Runtime options for reading and writing one page file.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub path: PathBuf,
    pub compression: CompressionSetting,
    pub auto_compress_threshold_bytes: u64,
    pub max_file_size_bytes: u64,
    pub backup: bool,
}

impl PageOptions {
    /// Options with the built-in defaults. Intended mainly for tests.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: CompressionSetting::Auto,
            auto_compress_threshold_bytes: DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES,
            max_file_size_bytes: 10 * 1024 * 1024,
            backup: true,
        }
    }

    pub fn from_config(config: &PageConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: config.compression,
            auto_compress_threshold_bytes: config
                .auto_compress_threshold_kb
                .saturating_mul(1024)
                .max(1),
            max_file_size_bytes: config.max_file_size_mb.saturating_mul(1024 * 1024).max(1),
            backup: config.backup,
        }
    }

    pub fn backup_file_path(&self) -> PathBuf {
        with_suffix(&self.path, ".bak")
    }

    pub fn lock_file_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    /// Unused sibling path for writing before the final rename.
    pub(crate) fn temp_file_path(&self) -> PathBuf {
        let mut candidate = with_suffix(&self.path, ".tmp");
        let mut counter = 0u32;
        while candidate.exists() {
            counter += 1;
            candidate = with_suffix(&self.path, &format!(".tmp{}", counter));
        }
        candidate
    }

    pub(crate) fn should_compress(&self, payload_len: usize) -> bool {
        match self.compression {
            CompressionSetting::Off => false,
            CompressionSetting::On => true,
            CompressionSetting::Auto => payload_len as u64 >= self.auto_compress_threshold_bytes,
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}
