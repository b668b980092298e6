//! On-disk page format.
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "last_modified": "2024-05-01T10:00:00Z",
//!   "strokes": [
//!     { "tool": "pen", "color": [0, 0, 0, 1], "widthBase": 3.0,
//!       "points": [{ "x": 1.0, "y": 2.0, "pressure": null, "width": 3.0, "t": 0 }],
//!       "timestamp": "2024-05-01T09:59:58Z" }
//!   ]
//! }
//! ```

use super::PageError;
use crate::draw::{Page, Stroke};
use chrono::{DateTime, Utc};
use flate2::{Compression, bufread::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Newest page format this build reads and the one it writes.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PageFileOut<'a> {
    format_version: u32,
    last_modified: DateTime<Utc>,
    strokes: Vec<&'a Stroke>,
}

#[derive(Deserialize)]
struct PageFileIn {
    format_version: u32,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    strokes: Vec<Stroke>,
}

/// Reads only the version so newer files are refused before their layout is parsed.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

/// A decoded page file.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub page: Page,
    pub format_version: u32,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Serializes `page` as pretty-printed page JSON.
pub fn page_to_json(page: &Page) -> Result<Vec<u8>, PageError> {
    let file = PageFileOut {
        format_version: CURRENT_VERSION,
        last_modified: Utc::now(),
        strokes: page.iter().map(|(_, stroke)| stroke.as_ref()).collect(),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Parses page JSON. Nothing is returned unless the whole document is valid.
pub fn page_from_json(bytes: &[u8]) -> Result<DecodedPage, PageError> {
    let probe: VersionProbe = serde_json::from_slice(bytes)?;
    if probe.format_version > CURRENT_VERSION {
        return Err(PageError::UnsupportedVersion {
            found: probe.format_version,
            supported: CURRENT_VERSION,
        });
    }

    let file: PageFileIn = serde_json::from_slice(bytes)?;
    for (index, stroke) in file.strokes.iter().enumerate() {
        check_stroke(stroke).map_err(|reason| PageError::InvalidStroke { index, reason })?;
    }
    let strokes = file.strokes.into_iter().map(|mut stroke| {
        stroke.fill_missing_widths();
        stroke
    });

    Ok(DecodedPage {
        page: Page::from_strokes(strokes),
        format_version: file.format_version,
        last_modified: file.last_modified,
    })
}

/// Committed strokes have at least one point and non-decreasing point times.
fn check_stroke(stroke: &Stroke) -> Result<(), &'static str> {
    if stroke.points.is_empty() {
        return Err("no points");
    }
    if stroke
        .points
        .windows(2)
        .any(|pair| pair[1].elapsed_us < pair[0].elapsed_us)
    {
        return Err("point times go backwards");
    }
    Ok(())
}

pub(crate) fn compress_bytes(data: &[u8]) -> Result<Vec<u8>, PageError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(PageError::Compress)?;
    encoder.finish().map_err(PageError::Compress)
}

pub(crate) fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>, PageError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(PageError::Decompress)?;
    Ok(out)
}

pub(crate) fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}
