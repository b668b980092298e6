//! Configuration type definitions.

use super::enums::{ColorSpec, CompressionSetting, EraserMode, ToolKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Palm rejection tuning.
///
/// Controls how long stylus activity suppresses touch input and how touch
/// contacts are confirmed when the stylus is idle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PalmRejectionConfig {
    /// Rolling stylus-activity window in milliseconds (valid range: 50 - 5000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Delay before a touch contact is accepted when no stylus is active (valid range: 0 - 500)
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,

    /// Contact size in canvas pixels above which a touch is treated as a palm
    #[serde(default = "default_palm_size_threshold")]
    pub palm_size_threshold: f64,

    /// Distance in canvas pixels within which a stylus landing retracts a recent touch stroke
    #[serde(default = "default_overlap_radius")]
    pub overlap_radius: f64,

    /// Whether a hovering stylus counts as stylus activity
    #[serde(default = "default_hover_counts_as_activity")]
    pub hover_counts_as_activity: bool,
}

impl Default for PalmRejectionConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            confirmation_delay_ms: default_confirmation_delay_ms(),
            palm_size_threshold: default_palm_size_threshold(),
            overlap_radius: default_overlap_radius(),
            hover_counts_as_activity: default_hover_counts_as_activity(),
        }
    }
}

/// Stroke appearance and pressure response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StrokeConfig {
    /// Tool selected at startup: pen, pencil, highlighter or eraser
    #[serde(default = "default_tool")]
    pub default_tool: ToolKind,

    /// Ink color - either a named color or an RGB array like `[0, 0, 255]`
    #[serde(default = "default_color")]
    pub default_color: ColorSpec,

    /// Base line width in canvas pixels (valid range: 0.5 - 50.0)
    #[serde(default = "default_base_width")]
    pub base_width: f64,

    /// Fraction of the base width drawn at zero pressure (valid range: 0.0 - 1.0)
    #[serde(default = "default_min_width_factor")]
    pub min_width_factor: f64,

    /// Pressure curve exponent; 1.0 is linear (valid range: 0.2 - 5.0)
    #[serde(default = "default_pressure_gamma")]
    pub pressure_gamma: f64,

    /// Pressure assumed for devices without a pressure axis (valid range: 0.0 - 1.0)
    #[serde(default = "default_pressure")]
    pub default_pressure: f64,

    /// Moving-average window in samples; 1 disables smoothing (valid range: 1 - 3)
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            default_tool: default_tool(),
            default_color: default_color(),
            base_width: default_base_width(),
            min_width_factor: default_min_width_factor(),
            pressure_gamma: default_pressure_gamma(),
            default_pressure: default_pressure(),
            smoothing_window: default_smoothing_window(),
        }
    }
}

/// Eraser behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EraserConfig {
    /// `stroke` removes whole strokes, `split` cuts out only the touched part
    #[serde(default)]
    pub mode: EraserMode,

    /// Eraser width in canvas pixels; the hit radius is twice this (valid range: 1.0 - 200.0)
    #[serde(default = "default_eraser_width")]
    pub width: f64,
}

impl Default for EraserConfig {
    fn default() -> Self {
        Self {
            mode: EraserMode::default(),
            width: default_eraser_width(),
        }
    }
}

/// Undo history.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryConfig {
    /// Maximum undoable actions; the oldest are dropped beyond this (valid range: 1 - 10000)
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

/// Canvas coordinate space that device axes are scaled into.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_width")]
    pub width: f64,

    #[serde(default = "default_canvas_height")]
    pub height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

/// Page file persistence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageConfig {
    /// Page file used by `--capture` when `--page` is not given.
    /// Defaults to `~/.local/share/stylusnote/page.json`
    #[serde(default)]
    pub default_path: Option<String>,

    /// Gzip page files: auto, on or off
    #[serde(default)]
    pub compression: CompressionSetting,

    /// Payload size that triggers compression in auto mode
    #[serde(default = "default_auto_compress_threshold_kb")]
    pub auto_compress_threshold_kb: u64,

    /// Refuse to read or write page files larger than this
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Keep the previous page file as `<name>.bak` when saving
    #[serde(default = "default_backup")]
    pub backup: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            default_path: None,
            compression: CompressionSetting::default(),
            auto_compress_threshold_kb: default_auto_compress_threshold_kb(),
            max_file_size_mb: default_max_file_size_mb(),
            backup: default_backup(),
        }
    }
}

/// Live capture loop.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunnerConfig {
    /// How often pending contacts are re-evaluated, in milliseconds (valid range: 1 - 100)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Capacity of the intake queue shared by all device readers
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_window_ms() -> u64 {
    500
}

fn default_confirmation_delay_ms() -> u64 {
    20
}

fn default_palm_size_threshold() -> f64 {
    30.0
}

fn default_overlap_radius() -> f64 {
    250.0
}

fn default_hover_counts_as_activity() -> bool {
    true
}

fn default_tool() -> ToolKind {
    ToolKind::Pen
}

fn default_color() -> ColorSpec {
    ColorSpec::Name("black".to_string())
}

fn default_base_width() -> f64 {
    3.0
}

fn default_min_width_factor() -> f64 {
    0.15
}

fn default_pressure_gamma() -> f64 {
    1.0
}

fn default_pressure() -> f64 {
    1.0
}

fn default_smoothing_window() -> usize {
    3
}

fn default_eraser_width() -> f64 {
    20.0
}

fn default_history_capacity() -> usize {
    100
}

fn default_canvas_width() -> f64 {
    1920.0
}

fn default_canvas_height() -> f64 {
    1080.0
}

fn default_auto_compress_threshold_kb() -> u64 {
    100
}

fn default_max_file_size_mb() -> u64 {
    10
}

fn default_backup() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    1024
}
