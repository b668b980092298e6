//! Input pipeline: raw device events to arbitrated pointer samples.
//!
//! Each device's raw evdev stream goes through its own [`EventNormalizer`],
//! producing [`InputEvent`]s in canvas space. The [`PalmArbiter`] then decides,
//! per contact, which samples become ink.

pub mod arbiter;
pub mod events;
pub mod normalize;

// Re-export commonly used types at module level
pub use arbiter::{ArbiterSettings, ArbiterStats, Decision, PalmArbiter, RejectReason, Verdict};
pub use events::{
    ContactId, ContactKey, InputEvent, Phase, PointerSample, RawEvent, RawEventKind, Tilt,
    ToolHint,
};
pub use normalize::{CanvasSize, EventNormalizer, NormalizerStats};
