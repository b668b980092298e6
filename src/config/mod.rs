//! Configuration file support for stylusnote.
//!
//! This module handles loading and validating user settings from the configuration file
//! located at `~/.config/stylusnote/config.toml`. Settings cover palm rejection timing,
//! pressure response, eraser behaviour, undo depth and page persistence.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

// Re-export commonly used types at module level
pub use enums::{ColorSpec, CompressionSetting, EraserMode, ToolKind};
pub use types::{
    CanvasConfig, EraserConfig, HistoryConfig, PageConfig, PalmRejectionConfig, RunnerConfig,
    StrokeConfig,
};

use crate::draw::ToolDescriptor;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure containing all user settings.
///
/// All fields have sensible defaults and will use those if not specified in the config file.
///
/// # Example TOML
/// ```toml
/// [palm_rejection]
/// window_ms = 500
/// confirmation_delay_ms = 20
/// palm_size_threshold = 30.0
///
/// [stroke]
/// default_tool = "pen"
/// default_color = "black"
/// base_width = 3.0
/// pressure_gamma = 1.0
///
/// [eraser]
/// mode = "split"
///
/// [history]
/// capacity = 100
///
/// [page]
/// compression = "auto"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Palm rejection timing and thresholds
    #[serde(default)]
    pub palm_rejection: PalmRejectionConfig,

    /// Stroke defaults and pressure-to-width curve
    #[serde(default)]
    pub stroke: StrokeConfig,

    /// Eraser behaviour
    #[serde(default)]
    pub eraser: EraserConfig,

    /// Undo history depth
    #[serde(default)]
    pub history: HistoryConfig,

    /// Canvas coordinate space
    #[serde(default)]
    pub canvas: CanvasConfig,

    /// Page file persistence
    #[serde(default)]
    pub page: PageConfig,

    /// Live capture loop tuning
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped to the nearest valid value and a warning is logged.
    ///
    /// Validated ranges:
    /// - `palm_rejection.window_ms`: 50 - 5000
    /// - `palm_rejection.confirmation_delay_ms`: 0 - 500
    /// - `palm_rejection.palm_size_threshold`, `overlap_radius`: >= 0.0
    /// - `stroke.base_width`: 0.5 - 50.0
    /// - `stroke.min_width_factor`, `default_pressure`: 0.0 - 1.0
    /// - `stroke.pressure_gamma`: 0.2 - 5.0
    /// - `stroke.smoothing_window`: 1 - 3
    /// - `eraser.width`: 1.0 - 200.0
    /// - `history.capacity`: 1 - 10000
    /// - `canvas.width`, `canvas.height`: 1.0 - 32768.0
    /// - `runner.tick_interval_ms`: 1 - 100
    pub fn validate_and_clamp(&mut self) {
        let palm = &mut self.palm_rejection;
        if !(50..=5000).contains(&palm.window_ms) {
            warn!(
                "Invalid palm_rejection.window_ms {}, clamping to 50-5000 range",
                palm.window_ms
            );
            palm.window_ms = palm.window_ms.clamp(50, 5000);
        }

        if palm.confirmation_delay_ms > 500 {
            warn!(
                "Invalid palm_rejection.confirmation_delay_ms {}, clamping to 0-500 range",
                palm.confirmation_delay_ms
            );
            palm.confirmation_delay_ms = 500;
        }

        if !(palm.palm_size_threshold >= 0.0) {
            warn!(
                "Invalid palm_rejection.palm_size_threshold {:.1}, using 30.0",
                palm.palm_size_threshold
            );
            palm.palm_size_threshold = 30.0;
        }

        if !(palm.overlap_radius >= 0.0) {
            warn!(
                "Invalid palm_rejection.overlap_radius {:.1}, using 250.0",
                palm.overlap_radius
            );
            palm.overlap_radius = 250.0;
        }

        let stroke = &mut self.stroke;
        clamp_f64("stroke.base_width", &mut stroke.base_width, 0.5, 50.0);
        clamp_f64(
            "stroke.min_width_factor",
            &mut stroke.min_width_factor,
            0.0,
            1.0,
        );
        clamp_f64("stroke.pressure_gamma", &mut stroke.pressure_gamma, 0.2, 5.0);
        clamp_f64(
            "stroke.default_pressure",
            &mut stroke.default_pressure,
            0.0,
            1.0,
        );

        if !(1..=3).contains(&stroke.smoothing_window) {
            warn!(
                "Invalid stroke.smoothing_window {}, clamping to 1-3 range",
                stroke.smoothing_window
            );
            stroke.smoothing_window = stroke.smoothing_window.clamp(1, 3);
        }

        clamp_f64("eraser.width", &mut self.eraser.width, 1.0, 200.0);

        if !(1..=10_000).contains(&self.history.capacity) {
            warn!(
                "Invalid history.capacity {}, clamping to 1-10000 range",
                self.history.capacity
            );
            self.history.capacity = self.history.capacity.clamp(1, 10_000);
        }

        clamp_f64("canvas.width", &mut self.canvas.width, 1.0, 32_768.0);
        clamp_f64("canvas.height", &mut self.canvas.height, 1.0, 32_768.0);

        if !(1..=100).contains(&self.runner.tick_interval_ms) {
            warn!(
                "Invalid runner.tick_interval_ms {}, clamping to 1-100 range",
                self.runner.tick_interval_ms
            );
            self.runner.tick_interval_ms = self.runner.tick_interval_ms.clamp(1, 100);
        }

        if self.runner.channel_capacity == 0 {
            warn!("Invalid runner.channel_capacity 0, using 1024");
            self.runner.channel_capacity = 1024;
        }

        if self.page.max_file_size_mb == 0 {
            warn!("Invalid page.max_file_size_mb 0, using 10");
            self.page.max_file_size_mb = 10;
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// The config file is located at `~/.config/stylusnote/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("stylusnote");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`, or returns defaults if the file is missing.
    ///
    /// All loaded values are validated and clamped to acceptable ranges.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// JSON schema of the configuration file, printed by `dump_config_schema`.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Tool the engine starts with.
    pub fn initial_tool(&self) -> ToolDescriptor {
        let width = match self.stroke.default_tool {
            ToolKind::Eraser => self.eraser.width,
            _ => self.stroke.base_width,
        };
        ToolDescriptor::new(
            self.stroke.default_tool,
            self.stroke.default_color.to_color(),
            width,
        )
    }

    /// Page file used when none is given on the command line.
    ///
    /// # Errors
    /// Returns an error if no data directory can be determined.
    pub fn default_page_path(&self) -> Result<PathBuf> {
        if let Some(raw) = &self.page.default_path {
            return Ok(expand_tilde(raw));
        }
        let data_dir = dirs::data_dir().context("Could not find data directory")?;
        Ok(data_dir.join("stylusnote").join("page.json"))
    }
}

fn clamp_f64(name: &str, value: &mut f64, min: f64, max: f64) {
    if !(min..=max).contains(&*value) {
        warn!(
            "Invalid {} {:.2}, clamping to {}-{} range",
            name, *value, min, max
        );
        *value = if value.is_nan() {
            min
        } else {
            (*value).clamp(min, max)
        };
    }
}

fn expand_tilde(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(raw)),
        None => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.palm_rejection.window_ms, 500);
        assert_eq!(config.palm_rejection.confirmation_delay_ms, 20);
        assert_eq!(config.history.capacity, 100);
        assert_eq!(config.stroke.default_tool, ToolKind::Pen);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[palm_rejection]\nwindow_ms = 800\n\n[eraser]\nmode = \"split\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.palm_rejection.window_ms, 800);
        assert_eq!(config.palm_rejection.palm_size_threshold, 30.0);
        assert_eq!(config.eraser.mode, EraserMode::Split);
        assert_eq!(config.eraser.width, 20.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = Config::default();
        config.palm_rejection.window_ms = 10;
        config.stroke.smoothing_window = 9;
        config.stroke.pressure_gamma = f64::NAN;
        config.history.capacity = 0;
        config.validate_and_clamp();

        assert_eq!(config.palm_rejection.window_ms, 50);
        assert_eq!(config.stroke.smoothing_window, 3);
        assert_eq!(config.stroke.pressure_gamma, 0.2);
        assert_eq!(config.history.capacity, 1);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[stroke\nbase_width = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }

    #[test]
    fn initial_tool_follows_stroke_section() {
        let mut config = Config::default();
        config.stroke.default_tool = ToolKind::Highlighter;
        config.stroke.default_color = ColorSpec::Rgb([255, 0, 0]);
        let tool = config.initial_tool();
        assert_eq!(tool.kind, ToolKind::Highlighter);
        assert_eq!(tool.color.r, 1.0);
        assert!(tool.color.a < 1.0);
    }

    #[test]
    fn schema_lists_sections() {
        let schema = serde_json::to_value(Config::json_schema()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("palm_rejection").is_some());
        assert!(properties.get("history").is_some());
    }
}
