//! Per-contact verdict state.

use crate::device::DeviceKind;
use crate::input::events::{ContactKey, PointerSample};
use crate::util::Bounds;

/// Why a contact was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Touch began while the stylus was (recently) active
    StylusActive,
    /// Reported contact area exceeded the palm-size threshold
    PalmSize,
    /// Accepted touch later overlapped by a stylus stroke in the same window
    Retracted,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::StylusActive => "stylus active",
            RejectReason::PalmSize => "palm size",
            RejectReason::Retracted => "retracted",
        }
    }
}

/// Verdict of a contact. Transitions:
///
/// - `Pending` to `Accepted` or `Rejected`, exactly once
/// - `Accepted` to `Rejected { Retracted }` for touch contacts (stylus override)
///
/// `Rejected` is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Waiting for the confirmation delay; samples are held back
    Pending { buffered: Vec<PointerSample> },
    Accepted,
    Rejected { reason: RejectReason },
}

/// A live tracked engagement of one device contact.
#[derive(Debug, Clone)]
pub struct Contact {
    pub key: ContactKey,
    pub kind: DeviceKind,
    pub first_seen_us: u64,
    pub last_seen_us: u64,
    pub sample_count: usize,
    /// Region touched so far, used for the stylus overlap test
    pub bounds: Bounds,
    /// Set once the contact lifted; accepted touch contacts linger until settled
    pub ended: bool,
    verdict: Verdict,
}

impl Contact {
    pub fn begin(kind: DeviceKind, sample: &PointerSample) -> Self {
        Self {
            key: sample.key(),
            kind,
            first_seen_us: sample.timestamp_us,
            last_seen_us: sample.timestamp_us,
            sample_count: 0,
            bounds: Bounds::from_point(sample.x, sample.y),
            ended: false,
            verdict: Verdict::Pending {
                buffered: Vec::new(),
            },
        }
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.verdict, Verdict::Pending { .. })
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.verdict, Verdict::Rejected { .. })
    }

    /// Records a sample's position and time.
    pub fn observe(&mut self, sample: &PointerSample) {
        self.bounds.include(sample.x, sample.y);
        self.last_seen_us = self.last_seen_us.max(sample.timestamp_us);
        self.sample_count += 1;
    }

    /// Holds a sample back while the verdict is pending.
    pub fn buffer(&mut self, sample: PointerSample) {
        if let Verdict::Pending { buffered } = &mut self.verdict {
            buffered.push(sample);
        }
    }

    /// Pending to Accepted. Returns the samples held back so far, in order.
    ///
    /// Returns `None` if the contact was not pending.
    pub fn accept(&mut self) -> Option<Vec<PointerSample>> {
        match std::mem::replace(&mut self.verdict, Verdict::Accepted) {
            Verdict::Pending { buffered } => Some(buffered),
            other => {
                self.verdict = other;
                None
            }
        }
    }

    /// Pending to Rejected. Buffered samples are discarded.
    pub fn reject(&mut self, reason: RejectReason) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.verdict = Verdict::Rejected { reason };
        true
    }

    /// Accepted to Rejected, the single permitted post-verdict flip.
    pub fn retract(&mut self) -> bool {
        if !self.is_accepted() {
            return false;
        }
        self.verdict = Verdict::Rejected {
            reason: RejectReason::Retracted,
        };
        true
    }
}
