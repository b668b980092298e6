use super::PageError;
use super::options::PageOptions;
use super::page_file::{
    self, DecodedPage, compress_bytes, decompress_bytes, is_gzip, page_to_json,
};
use crate::draw::Page;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A page read from disk.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page: Page,
    pub format_version: u32,
    pub last_modified: Option<DateTime<Utc>>,
    pub compressed: bool,
}

/// What a save wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub bytes: usize,
    pub compressed: bool,
    pub backed_up: bool,
}

/// Summary information about a page file for CLI reporting.
#[derive(Debug, Clone)]
pub struct PageInspection {
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub modified: Option<SystemTime>,
    pub backup_path: PathBuf,
    pub backup_exists: bool,
    pub backup_size_bytes: Option<u64>,
    pub format_version: Option<u32>,
    pub last_modified: Option<DateTime<Utc>>,
    pub stroke_count: usize,
    pub point_count: usize,
    pub compressed: bool,
}

/// Writes `page` atomically: temp file, optional `.bak` rotation, then rename.
pub fn save_page(page: &Page, options: &PageOptions) -> Result<SaveOutcome, PageError> {
    if let Some(dir) = options.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(PageError::io("create directory", dir))?;
    }

    let lock_path = options.lock_file_path();
    let lock_file = open_lock_file(&lock_path)?;
    lock_file
        .lock_exclusive()
        .map_err(PageError::io("lock", &lock_path))?;

    let result = save_page_inner(page, options);

    lock_file.unlock().unwrap_or_else(|err| {
        warn!("failed to unlock page file {}: {}", lock_path.display(), err)
    });

    result
}

fn save_page_inner(page: &Page, options: &PageOptions) -> Result<SaveOutcome, PageError> {
    let page_path = &options.path;
    let backup_path = options.backup_file_path();

    let mut payload = page_to_json(page)?;
    if payload.len() as u64 > options.max_file_size_bytes {
        return Err(PageError::TooLarge {
            size: payload.len() as u64,
            limit: options.max_file_size_bytes,
        });
    }

    let compressed = options.should_compress(payload.len());
    if compressed {
        payload = compress_bytes(&payload)?;
    }

    let tmp_path = options.temp_file_path();
    {
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .map_err(PageError::io("create temporary file", &tmp_path))?;
        tmp_file
            .write_all(&payload)
            .map_err(PageError::io("write", &tmp_path))?;
        tmp_file
            .sync_all()
            .map_err(PageError::io("sync", &tmp_path))?;
    }

    let mut backed_up = false;
    if page_path.exists() {
        if options.backup {
            if backup_path.exists() {
                fs::remove_file(&backup_path).ok();
            }
            fs::rename(page_path, &backup_path)
                .map_err(PageError::io("rotate previous page file", page_path))?;
            backed_up = true;
        } else {
            fs::remove_file(page_path).ok();
        }
    }

    fs::rename(&tmp_path, page_path).map_err(PageError::io("move temporary file", &tmp_path))?;

    info!(
        "Page saved to {} ({} strokes, {} bytes, compression={})",
        page_path.display(),
        page.len(),
        payload.len(),
        compressed
    );

    Ok(SaveOutcome {
        bytes: payload.len(),
        compressed,
        backed_up,
    })
}

/// Reads the page file. Returns `Ok(None)` when it does not exist yet.
///
/// A file written by a newer format version fails with
/// [`PageError::UnsupportedVersion`] and nothing is loaded.
pub fn load_page(options: &PageOptions) -> Result<Option<LoadedPage>, PageError> {
    let page_path = &options.path;
    if !page_path.exists() {
        debug!("No page file at {}, starting empty", page_path.display());
        return Ok(None);
    }

    let metadata = fs::metadata(page_path).map_err(PageError::io("stat", page_path))?;
    if metadata.len() > options.max_file_size_bytes {
        return Err(PageError::TooLarge {
            size: metadata.len(),
            limit: options.max_file_size_bytes,
        });
    }

    let lock_path = options.lock_file_path();
    let lock_file = open_lock_file(&lock_path)?;
    lock_file
        .lock_shared()
        .map_err(PageError::io("lock", &lock_path))?;

    let result = load_page_inner(page_path);

    lock_file.unlock().unwrap_or_else(|err| {
        warn!("failed to unlock page file {}: {}", lock_path.display(), err)
    });

    let loaded = result?;
    info!(
        "Loaded {} strokes from {}",
        loaded.page.len(),
        page_path.display()
    );
    Ok(Some(loaded))
}

fn load_page_inner(page_path: &Path) -> Result<LoadedPage, PageError> {
    let mut file_bytes = Vec::new();
    File::open(page_path)
        .and_then(|mut file| file.read_to_end(&mut file_bytes))
        .map_err(PageError::io("read", page_path))?;

    let compressed = is_gzip(&file_bytes);
    let json = if compressed {
        decompress_bytes(&file_bytes)?
    } else {
        file_bytes
    };

    let DecodedPage {
        page,
        format_version,
        last_modified,
    } = page_file::page_from_json(&json)?;

    Ok(LoadedPage {
        page,
        format_version,
        last_modified,
        compressed,
    })
}

/// Inspects the page file and its backup without modifying either.
pub fn inspect_page(options: &PageOptions) -> Result<PageInspection, PageError> {
    let metadata = fs::metadata(&options.path).ok();
    let backup_path = options.backup_file_path();
    let backup_meta = fs::metadata(&backup_path).ok();

    let mut inspection = PageInspection {
        path: options.path.clone(),
        exists: metadata.is_some(),
        size_bytes: metadata.as_ref().map(|m| m.len()),
        modified: metadata.as_ref().and_then(|m| m.modified().ok()),
        backup_exists: backup_meta.is_some(),
        backup_size_bytes: backup_meta.as_ref().map(|m| m.len()),
        backup_path,
        format_version: None,
        last_modified: None,
        stroke_count: 0,
        point_count: 0,
        compressed: false,
    };

    if let Some(loaded) = load_page(options)? {
        inspection.format_version = Some(loaded.format_version);
        inspection.last_modified = loaded.last_modified;
        inspection.stroke_count = loaded.page.len();
        inspection.point_count = loaded.page.iter().map(|(_, stroke)| stroke.len()).sum();
        inspection.compressed = loaded.compressed;
    }

    Ok(inspection)
}

fn open_lock_file(lock_path: &Path) -> Result<File, PageError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(PageError::io("open lock file", lock_path))
}
