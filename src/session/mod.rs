//! Page persistence.
//!
//! Serializes the committed strokes of a page to versioned JSON, writes it to
//! disk with locking, optional compression and backup rotation, and restores
//! it on startup.

mod options;
mod page_file;
mod storage;

pub use options::{DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES, PageOptions};
pub use page_file::{CURRENT_VERSION, DecodedPage, page_from_json, page_to_json};
pub use storage::{LoadedPage, PageInspection, SaveOutcome, inspect_page, load_page, save_page};

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing page files.
#[derive(Debug, Error)]
pub enum PageError {
    /// Written by a newer build; nothing was applied
    #[error("page format version {found} is not supported (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("page data is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// A stroke record breaks the committed-stroke rules; nothing was applied
    #[error("stroke {index} in page file is invalid: {reason}")]
    InvalidStroke { index: usize, reason: &'static str },

    #[error("invalid page json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to compress page data: {0}")]
    Compress(#[source] io::Error),

    #[error("failed to decompress page file: {0}")]
    Decompress(#[source] io::Error),

    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PageError {
    /// Adapter for `map_err` that records what was being done to which path.
    pub(crate) fn io(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> PageError {
        let path = path.to_path_buf();
        move |source| PageError::Io {
            action,
            path,
            source,
        }
    }
}
