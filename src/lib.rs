//! Library exports for the stylusnote ink pipeline.
//!
//! Exposes device discovery, event normalization, palm rejection, stroke
//! capture, history and page persistence so that the binary and external tools
//! (such as the config schema dumper) share one implementation.

pub mod config;
pub mod device;
pub mod draw;
pub mod engine;
pub mod history;
pub mod input;
pub mod runner;
pub mod session;
pub mod util;

pub use config::Config;
