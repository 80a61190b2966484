// Ideal capture timeline
//
// Frame k of the output should be presented at start + k / rate. The tracker
// reports the ideal time of the next frame shifted back by half an interval,
// so a tick landing anywhere inside that frame's slot counts as on time.

/// Tracks how many frames have been emitted against a fixed output rate
#[derive(Debug, Clone)]
pub struct Timeline {
    start_time: f64,
    frame_rate: f64,
    emitted: u64,
}

impl Timeline {
    /// Start a timeline at `start_time` (the wall-clock time of the first
    /// captured tick). `frame_rate` must already be validated as > 0.
    pub fn new(start_time: f64, frame_rate: f64) -> Self {
        debug_assert!(frame_rate > 0.0);
        Self {
            start_time,
            frame_rate,
            emitted: 0,
        }
    }

    /// Presentation time the next emitted frame ought to have
    pub fn ideal_time(&self) -> f64 {
        self.start_time + (self.emitted as f64 - 0.5) / self.frame_rate
    }

    /// Record `n` more emitted frames. Saturates instead of wrapping.
    pub fn advance(&mut self, n: u64) {
        self.emitted = self.emitted.saturating_add(n);
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Duration of one output frame in seconds
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.frame_rate
    }
}
