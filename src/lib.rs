// Framepace - fixed-rate frame capture for interactive renderers
// Main library entry point

pub mod capture;
pub mod clock;
pub mod config;
pub mod encoding;
pub mod overlay;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_support;

pub use capture::{CaptureError, CaptureStats, CaptureStatus, TickReport, VideoCapture};
pub use config::{CaptureConfig, CaptureSettings, ConfigError};
