use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use stylusnote::Config;
use stylusnote::device::{EvdevSource, InputSource};
use stylusnote::runner::Runner;
use stylusnote::session::{PageInspection, PageOptions, inspect_page};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("STYLUSNOTE_GIT_HASH"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "stylusnote")]
#[command(version = VERSION, about = "Stylus-first ink capture with palm rejection")]
struct Cli {
    /// List input devices and how they are classified
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["capture", "inspect"])]
    list_devices: bool,

    /// Capture strokes from every pointer device until SIGINT/SIGTERM, then save the page
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "inspect")]
    capture: bool,

    /// Print a summary of the page file
    #[arg(long, action = ArgAction::SetTrue)]
    inspect: bool,

    /// Page file to load and save (default: ~/.local/share/stylusnote/page.json)
    #[arg(long, value_name = "PATH")]
    page: Option<PathBuf>,

    /// Config file (default: ~/.config/stylusnote/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    if !cli.capture && !cli.inspect {
        print_usage();
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let page_path = match cli.page {
        Some(path) => path,
        None => config.default_page_path()?,
    };
    let options = PageOptions::from_config(&config.page, page_path);

    if cli.inspect {
        let inspection = inspect_page(&options)
            .with_context(|| format!("Failed to inspect page {}", options.path.display()))?;
        print_inspection(&inspection);
        return Ok(());
    }

    log::info!("Starting capture; press Ctrl+C to finish and save");
    let summary = Runner::new(config, Arc::new(EvdevSource::default()), options.clone()).run()?;

    println!(
        "Saved {} stroke(s) to {} ({} bytes{})",
        summary.strokes,
        options.path.display(),
        summary.saved.bytes,
        if summary.saved.compressed {
            ", gzip"
        } else {
            ""
        }
    );
    println!(
        "Palm rejection: {} accepted, {} rejected while the stylus was active, {} rejected by size, {} retracted",
        summary.arbiter.accepted,
        summary.arbiter.rejected_stylus_active,
        summary.arbiter.rejected_palm_size,
        summary.arbiter.retracted
    );
    if summary.malformed_records > 0 || summary.dropped_frames > 0 {
        println!(
            "Input: {} malformed record(s), {} dropped frame(s)",
            summary.malformed_records, summary.dropped_frames
        );
    }

    Ok(())
}

fn list_devices() -> Result<()> {
    let devices = EvdevSource::default()
        .list_devices()
        .context("Failed to list input devices")?;

    if devices.is_empty() {
        println!("No input devices found");
        return Ok(());
    }

    for device in devices {
        println!(
            "{:<6} {:<8} {:<22} {}",
            device.id().to_string(),
            device.kind().as_str(),
            device.path().display(),
            device.name()
        );
    }
    Ok(())
}

fn print_inspection(inspection: &PageInspection) {
    println!("Page file: {}", inspection.path.display());
    if !inspection.exists {
        println!("  (not created yet)");
    } else {
        if let Some(size) = inspection.size_bytes {
            println!("  Size: {} bytes", size);
        }
        if let Some(modified) = inspection.modified {
            println!("  Modified: {}", DateTime::<Local>::from(modified).to_rfc3339());
        }
        if let Some(version) = inspection.format_version {
            println!("  Format version: {}", version);
        }
        if let Some(saved) = inspection.last_modified {
            println!("  Last saved: {}", saved.to_rfc3339());
        }
        println!(
            "  Strokes: {} ({} points)",
            inspection.stroke_count, inspection.point_count
        );
        println!(
            "  Compressed: {}",
            if inspection.compressed { "yes" } else { "no" }
        );
    }

    match inspection.backup_size_bytes {
        Some(size) if inspection.backup_exists => println!(
            "Backup: {} ({} bytes)",
            inspection.backup_path.display(),
            size
        ),
        _ => println!("Backup: none"),
    }
}

fn print_usage() {
    println!("stylusnote: stylus-first ink capture with palm rejection");
    println!();
    println!("Usage:");
    println!("  stylusnote --list-devices         Show input devices and their classification");
    println!("  stylusnote --capture [--page F]   Capture strokes until Ctrl+C, then save");
    println!("  stylusnote --inspect [--page F]   Summarize a saved page");
    println!("  stylusnote --help                 Show help");
    println!();
    println!("Requirements:");
    println!("  - Read access to /dev/input/event* (usually the 'input' group)");
}
