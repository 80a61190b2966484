//! Frame pacing decisions
//!
//! The render loop is a best-effort producer feeding a fixed-rate consumer.
//! Every tick compares the wall clock against the [`Timeline`](super::Timeline)
//! and picks one of four actions:
//!
//! | gap (now - ideal)            | decision          | frames emitted |
//! |------------------------------|-------------------|----------------|
//! | `gap < 0`                    | `Skip`            | 0              |
//! | `0 <= gap < interval`        | `EmitOnce`        | 1              |
//! | `interval <= gap < 2*interval` | `EmitTwice`     | 2              |
//! | `gap >= 2*interval`          | `EmitCatchUp(n)`  | n = floor(gap * rate) |
//!
//! A catch-up re-anchors the timeline to the wall clock in one step, so drift
//! never accumulates. How many pushes a catch-up actually produces is decided
//! by the [`CatchUpPolicy`].

use serde::{Deserialize, Serialize};

/// Default cap on duplicate pushes for a single catch-up tick
pub const DEFAULT_MAX_BURST: u32 = 60;

/// What to do on one render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    /// Rendering is ahead of schedule; emit nothing
    Skip,
    /// On schedule; emit the frame once
    EmitOnce,
    /// One frame behind; emit the frame twice
    EmitTwice,
    /// At least two frames behind; jump the timeline forward by `n` frames
    EmitCatchUp(u64),
}

impl PacingDecision {
    /// How far the timeline advances for this decision
    pub fn frames(&self) -> u64 {
        match self {
            PacingDecision::Skip => 0,
            PacingDecision::EmitOnce => 1,
            PacingDecision::EmitTwice => 2,
            PacingDecision::EmitCatchUp(n) => *n,
        }
    }

    pub fn is_catch_up(&self) -> bool {
        matches!(self, PacingDecision::EmitCatchUp(_))
    }
}

/// Classify a tick given the current time, the timeline's ideal time and the
/// output frame rate (validated > 0)
pub fn decide(now: f64, ideal_time: f64, frame_rate: f64) -> PacingDecision {
    let gap = now - ideal_time;
    let interval = 1.0 / frame_rate;

    if gap < 0.0 {
        PacingDecision::Skip
    } else if gap < interval {
        PacingDecision::EmitOnce
    } else if gap < interval * 2.0 {
        PacingDecision::EmitTwice
    } else {
        // gap >= 2 intervals, so n >= 2 barring rounding in gap * rate
        let n = (gap * frame_rate).floor() as u64;
        PacingDecision::EmitCatchUp(n.max(2))
    }
}

/// How a catch-up tick turns into encoder pushes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CatchUpPolicy {
    /// Push one duplicate per skipped slot, at most `max_burst` per tick.
    /// Slots beyond the cap are left out of the output.
    Duplicate { max_burst: u32 },
    /// Push the frame once; all skipped slots are left out of the output.
    Single,
}

impl Default for CatchUpPolicy {
    fn default() -> Self {
        Self::Duplicate {
            max_burst: DEFAULT_MAX_BURST,
        }
    }
}

/// Pushes and timeline movement for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPlan {
    pub decision: PacingDecision,
    /// Copies of the current frame to push
    pub pushes: u64,
    /// Frames the timeline advances by
    pub advance: u64,
    /// Slots the timeline covers that get no frame in the output
    pub omitted: u64,
}

impl CatchUpPolicy {
    /// Turn a decision into a concrete plan
    pub fn plan(&self, decision: PacingDecision) -> PacingPlan {
        let advance = decision.frames();
        let pushes = match (decision, self) {
            (PacingDecision::EmitCatchUp(n), CatchUpPolicy::Duplicate { max_burst }) => {
                n.min(*max_burst as u64)
            }
            (PacingDecision::EmitCatchUp(_), CatchUpPolicy::Single) => 1,
            _ => advance,
        };
        PacingPlan {
            decision,
            pushes,
            advance,
            omitted: advance - pushes,
        }
    }
}
