//! Encoder session contract
//!
//! The capturing component never talks to an encoder directly. It asks a
//! [`SessionFactory`] for a session when the first frame arrives and then
//! drives it through [`EncoderSession`]:
//!
//! - `push_frame(Some(pixels))` - copy one frame out and queue it
//! - `push_frame(None)` - a skipped tick, bookkeeping only
//! - `complete_pending_pushes()` - once per application frame, after rendering
//! - `close()` / `dispose()` - explicit teardown, both idempotent

use std::path::PathBuf;

use super::Preset;

/// Error type for encoder operations
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("Failed to launch encoder: {0}")]
    Launch(String),

    #[error("Encoder pipe broken: {0}")]
    Pipe(String),

    #[error("Encoder exited with {status}: {stderr}")]
    ProcessExit { status: String, stderr: String },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Session already closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

/// Everything a factory needs to open a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// Output path without the container suffix
    pub output_path_prefix: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub preset: Preset,
}

impl SessionRequest {
    /// Full output path including the preset's suffix
    pub fn output_path(&self) -> PathBuf {
        let mut path = self.output_path_prefix.clone().into_os_string();
        path.push(self.preset.suffix());
        PathBuf::from(path)
    }

    /// Size of one RGBA frame in bytes
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// An open encoder pipe
pub trait EncoderSession {
    /// Queue a frame for encoding
    ///
    /// The pixels are copied before returning; the caller may overwrite its
    /// buffer immediately. `None` marks a tick that produced no frame.
    fn push_frame(&mut self, frame: Option<&[u8]>) -> Result<()>;

    /// Back-pressure checkpoint, called once per application frame
    ///
    /// Returns once every pushed frame has been accepted by the pipe side and
    /// the queue is short enough. Must be a cheap no-op when nothing is
    /// pending.
    fn complete_pending_pushes(&mut self) -> Result<()>;

    /// Finish the stream and wait for the encoder to exit
    fn close(&mut self) -> Result<()>;

    /// Release everything, killing the encoder if it is still running
    fn dispose(&mut self);
}

/// Creates encoder sessions on demand
pub trait SessionFactory {
    type Session: EncoderSession;

    fn create(&self, request: &SessionRequest) -> Result<Self::Session>;
}
