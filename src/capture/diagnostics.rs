// Frame drop diagnostics
//
// Counts ticks that needed a catch-up. Purely informational: the warning is
// raised once per session and never affects what gets pushed.

/// Catch-up ticks needed before the warning fires
pub const DROP_WARNING_THRESHOLD: u32 = 10;

/// Per-session count of catch-up ticks
#[derive(Debug, Default, Clone)]
pub struct DropCounter {
    count: u32,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one catch-up tick
    ///
    /// Returns true exactly once, on the tick that reaches the threshold, after
    /// logging the warning.
    pub fn record(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count != DROP_WARNING_THRESHOLD {
            return false;
        }

        log::warn!(
            "Significant frame dropping detected ({} catch-up ticks). This may introduce \
             time instability into the output video; a lower recording frame rate is recommended.",
            self.count
        );
        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the one-time warning has already fired
    pub fn warned(&self) -> bool {
        self.count >= DROP_WARNING_THRESHOLD
    }
}
