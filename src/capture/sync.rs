// End-of-frame synchronizer
//
// Once all rendering for an application frame is done, the encoder session
// gets exactly one `complete_pending_pushes()` call. The host reports frame
// completion with its own frame index; repeats of the same index are ignored,
// so hooking the call into more than one end-of-frame callback is harmless.

use crate::encoding::{EncoderSession, Result};

/// Synchronizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No session; end-of-frame signals are ignored
    Idle,
    /// Session open; flush once per frame index
    Active { last_flushed: Option<u64> },
}

/// Per-frame flush barrier between the render loop and the encoder session
#[derive(Debug)]
pub struct EndOfFrameSync {
    state: SyncState,
}

impl EndOfFrameSync {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SyncState::Active { .. })
    }

    /// Start flushing; called when a session opens
    pub fn activate(&mut self) {
        if !self.is_active() {
            self.state = SyncState::Active { last_flushed: None };
        }
    }

    /// Stop flushing; called on teardown. No further flushes are scheduled.
    pub fn deactivate(&mut self) {
        self.state = SyncState::Idle;
    }

    /// Signal that rendering of `frame_index` has completed
    ///
    /// Returns `Ok(true)` when the session was flushed, `Ok(false)` when the
    /// signal was ignored (idle, or this frame was already flushed).
    pub fn end_of_frame<S: EncoderSession + ?Sized>(
        &mut self,
        frame_index: u64,
        session: &mut S,
    ) -> Result<bool> {
        let SyncState::Active { last_flushed } = self.state else {
            return Ok(false);
        };
        if last_flushed == Some(frame_index) {
            return Ok(false);
        }

        self.state = SyncState::Active {
            last_flushed: Some(frame_index),
        };
        session.complete_pending_pushes()?;
        Ok(true)
    }
}

impl Default for EndOfFrameSync {
    fn default() -> Self {
        Self::new()
    }
}
