//! Ink model: strokes, the page that owns them, and how they are built.
//!
//! - [`Color`]: RGBA color with predefined constants
//! - [`Stroke`]: an immutable committed stroke and its [`ToolDescriptor`]
//! - [`StrokeBuilder`]: turns accepted samples into a stroke
//! - [`Page`]: ordered set of committed strokes
//! - [`eraser`]: hit testing for the eraser tool

pub mod builder;
pub mod color;
pub mod dirty;
pub mod eraser;
pub mod page;
pub mod stroke;

// Re-export commonly used types at module level
pub use builder::{PressureCurve, StrokeBuilder};
pub use color::Color;
pub use dirty::DirtyTracker;
pub use eraser::{EraserMode, Erasure, erase};
pub use page::{Page, StrokeId};
pub use stroke::{Stroke, StrokePoint, ToolDescriptor, ToolKind};
