//! FFmpeg subprocess encoder session
//!
//! Raw RGBA frames are piped into `ffmpeg` over stdin. The render thread never
//! touches the pipe itself:
//!
//! - Producer: the capture component calls `push_frame()`, which copies the
//!   pixels into a (recycled) buffer and queues it without blocking
//! - Consumer: the `framepace-pipe` thread writes queued buffers to stdin
//! - Checkpoint: `complete_pending_pushes()` waits only while more than
//!   `queue_limit` frames are still queued, so slow encoders can't make the
//!   queue grow without bound
//!
//! A second thread drains stderr so FFmpeg never blocks on a full stderr pipe;
//! its output is reported when the session closes.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use super::presets;
use super::session::{EncoderError, EncoderSession, Result, SessionFactory, SessionRequest};

/// Frames allowed to sit in the pipe queue after a checkpoint
pub const DEFAULT_QUEUE_LIMIT: usize = 4;

/// Lines of FFmpeg stderr kept for error reporting
const STDERR_TAIL_LINES: usize = 32;

/// How long a checkpoint waits between re-checks of the pipe state
const PONG_TIMEOUT: Duration = Duration::from_millis(100);

/// Build the full FFmpeg argument list for a session
pub fn build_command_args(request: &SessionRequest) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-f",
        "rawvideo",
        "-vcodec",
        "rawvideo",
        "-pixel_format",
        "rgba",
        "-colorspace",
        "bt709",
        "-video_size",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("{}x{}", request.width, request.height));
    args.push("-framerate".into());
    args.push(format_frame_rate(request.frame_rate));
    args.extend(["-loglevel", "warning", "-i", "-"].iter().map(|s| s.to_string()));
    args.extend(presets::output_args(request.preset).iter().map(|s| s.to_string()));
    args.push(request.output_path().to_string_lossy().to_string());
    args
}

/// Keep only the last `STDERR_TAIL_LINES` lines
fn push_tail_line(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Integral rates print without a fraction ("60"), others keep it ("29.97")
fn format_frame_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{}", rate as u64)
    } else {
        format!("{}", rate)
    }
}

/// Opens [`FfmpegSession`]s using a given FFmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegSessionFactory {
    ffmpeg_path: PathBuf,
    queue_limit: usize,
}

impl FfmpegSessionFactory {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }

    /// Override how many frames may stay queued after a checkpoint
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

impl Default for FfmpegSessionFactory {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl SessionFactory for FfmpegSessionFactory {
    type Session = FfmpegSession;

    fn create(&self, request: &SessionRequest) -> Result<FfmpegSession> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(build_command_args(request));
        log::debug!(
            "Launching {} {}",
            self.ffmpeg_path.display(),
            build_command_args(request).join(" ")
        );
        FfmpegSession::spawn(command, request, self.queue_limit)
    }
}

/// Messages sent to the pipe thread
enum PipeMessage {
    /// A frame to write
    Frame(Vec<u8>),
    /// Stop writing and close stdin
    Finish,
}

/// Pipe state shared between the render thread and the pipe thread
struct PipeState {
    queued: usize,
    frames_written: u64,
    bytes_written: u64,
    finished: bool,
    last_error: Option<String>,
}

struct Shared {
    state: Mutex<PipeState>,
    /// Signalled by the pipe thread after every write and when it exits
    pong: Condvar,
}

/// Counters for an FFmpeg session
#[derive(Debug, Clone, Default)]
pub struct PipeStats {
    pub frames_pushed: u64,
    pub frames_written: u64,
    pub bytes_written: u64,
    pub queued: usize,
}

/// An `ffmpeg` child process fed through a dedicated pipe thread
pub struct FfmpegSession {
    frame_sender: Option<Sender<PipeMessage>>,
    /// Spent buffers handed back by the pipe thread
    recycled: Receiver<Vec<u8>>,
    pipe_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<VecDeque<String>>>,
    child: Option<Child>,
    shared: Arc<Shared>,
    frame_len: usize,
    queue_limit: usize,
    frames_pushed: u64,
    output_path: PathBuf,
    closed: bool,
}

impl FfmpegSession {
    /// Spawn the prepared command and start the pipe threads
    ///
    /// The command's stdio is overridden: stdin and stderr piped, stdout
    /// discarded.
    pub(crate) fn spawn(
        mut command: Command,
        request: &SessionRequest,
        queue_limit: usize,
    ) -> Result<Self> {
        let program = command.get_program().to_string_lossy().to_string();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncoderError::Launch(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Launch("stdin was not captured".into()))?;
        let stderr = child.stderr.take();

        let shared = Arc::new(Shared {
            state: Mutex::new(PipeState {
                queued: 0,
                frames_written: 0,
                bytes_written: 0,
                finished: false,
                last_error: None,
            }),
            pong: Condvar::new(),
        });

        let (frame_sender, frame_receiver) = unbounded::<PipeMessage>();
        let (recycle_sender, recycled) = bounded::<Vec<u8>>(queue_limit + 2);

        let shared_clone = shared.clone();
        let pipe_thread = std::thread::Builder::new()
            .name("framepace-pipe".into())
            .spawn(move || Self::pipe_thread_main(stdin, frame_receiver, recycle_sender, shared_clone));

        let pipe_thread = match pipe_thread {
            Ok(handle) => handle,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EncoderError::Launch(format!("Failed to spawn pipe thread: {}", e)));
            }
        };

        let stderr_thread = stderr.and_then(|stderr| {
            std::thread::Builder::new()
                .name("framepace-stderr".into())
                .spawn(move || Self::stderr_thread_main(stderr))
                .ok()
        });

        log::info!(
            "Encoder session started: {} ({}x{} @ {} fps, {})",
            request.output_path().display(),
            request.width,
            request.height,
            request.frame_rate,
            request.preset.display_name()
        );

        Ok(Self {
            frame_sender: Some(frame_sender),
            recycled,
            pipe_thread: Some(pipe_thread),
            stderr_thread,
            child: Some(child),
            shared,
            frame_len: request.frame_len(),
            queue_limit,
            frames_pushed: 0,
            output_path: request.output_path(),
            closed: false,
        })
    }

    /// Path of the file being written
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Current counters
    pub fn stats(&self) -> PipeStats {
        let state = self.shared.state.lock();
        PipeStats {
            frames_pushed: self.frames_pushed,
            frames_written: state.frames_written,
            bytes_written: state.bytes_written,
            queued: state.queued,
        }
    }

    fn pipe_thread_main(
        mut stdin: ChildStdin,
        receiver: Receiver<PipeMessage>,
        recycle: Sender<Vec<u8>>,
        shared: Arc<Shared>,
    ) {
        loop {
            match receiver.recv() {
                Ok(PipeMessage::Frame(buffer)) => {
                    let result = stdin.write_all(&buffer);
                    {
                        let mut state = shared.state.lock();
                        state.queued = state.queued.saturating_sub(1);
                        match result {
                            Ok(()) => {
                                state.frames_written += 1;
                                state.bytes_written += buffer.len() as u64;
                            }
                            Err(ref e) => {
                                state.last_error = Some(format!("write to encoder stdin failed: {}", e));
                            }
                        }
                    }
                    shared.pong.notify_all();

                    if let Err(e) = result {
                        log::error!("Encoder pipe broken: {}", e);
                        break;
                    }

                    // Full recycle queue just means the buffer is dropped
                    let _ = recycle.try_send(buffer);
                }
                Ok(PipeMessage::Finish) | Err(_) => break,
            }
        }

        if let Err(e) = stdin.flush() {
            log::debug!("Flushing encoder stdin failed: {}", e);
        }
        // Dropping stdin closes the pipe, which lets FFmpeg finalize the file
        drop(stdin);

        shared.state.lock().finished = true;
        shared.pong.notify_all();
    }

    fn stderr_thread_main(stderr: std::process::ChildStderr) -> VecDeque<String> {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            log::debug!("ffmpeg: {}", line);
            push_tail_line(&mut tail, line);
        }
        tail
    }

    fn pipe_error(&self) -> Option<EncoderError> {
        self.shared
            .state
            .lock()
            .last_error
            .clone()
            .map(EncoderError::Pipe)
    }
}

impl EncoderSession for FfmpegSession {
    fn push_frame(&mut self, frame: Option<&[u8]>) -> Result<()> {
        if self.closed {
            return Err(EncoderError::Closed);
        }
        if let Some(err) = self.pipe_error() {
            return Err(err);
        }

        let Some(pixels) = frame else {
            // Skipped tick: nothing to write
            return Ok(());
        };

        if pixels.len() != self.frame_len {
            return Err(EncoderError::FrameSize {
                expected: self.frame_len,
                actual: pixels.len(),
            });
        }

        let mut buffer = self
            .recycled
            .try_recv()
            .unwrap_or_else(|_| Vec::with_capacity(self.frame_len));
        buffer.clear();
        buffer.extend_from_slice(pixels);

        let sender = self.frame_sender.as_ref().ok_or(EncoderError::Closed)?;

        // Count before sending so the pipe thread never sees an underflow
        self.shared.state.lock().queued += 1;
        if sender.send(PipeMessage::Frame(buffer)).is_err() {
            let mut state = self.shared.state.lock();
            state.queued = state.queued.saturating_sub(1);
            return Err(EncoderError::Pipe("pipe thread disconnected".into()));
        }

        self.frames_pushed += 1;
        Ok(())
    }

    fn complete_pending_pushes(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let mut state = self.shared.state.lock();
        loop {
            if let Some(ref err) = state.last_error {
                return Err(EncoderError::Pipe(err.clone()));
            }
            if state.queued <= self.queue_limit {
                return Ok(());
            }
            if state.finished {
                return Err(EncoderError::Pipe("pipe thread exited with frames queued".into()));
            }
            self.shared.pong.wait_for(&mut state, PONG_TIMEOUT);
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(sender) = self.frame_sender.take() {
            let _ = sender.send(PipeMessage::Finish);
        }
        if let Some(handle) = self.pipe_thread.take() {
            if handle.join().is_err() {
                log::error!("Encoder pipe thread panicked");
            }
        }

        let status = match self.child.take() {
            Some(mut child) => Some(child.wait()?),
            None => None,
        };

        let stderr_tail = self
            .stderr_thread
            .take()
            .and_then(|handle| handle.join().ok())
            .map(Vec::from)
            .unwrap_or_default();

        for line in &stderr_tail {
            log::warn!("ffmpeg: {}", line);
        }

        if let Some(err) = self.pipe_error() {
            return Err(err);
        }

        if let Some(status) = status {
            if !status.success() {
                return Err(EncoderError::ProcessExit {
                    status: status.to_string(),
                    stderr: stderr_tail.join("\n"),
                });
            }
        }

        let stats = self.stats();
        log::info!(
            "Encoder session closed: {} ({} frames, {} bytes piped)",
            self.output_path.display(),
            stats.frames_written,
            stats.bytes_written
        );
        Ok(())
    }

    fn dispose(&mut self) {
        self.closed = true;

        // Disconnecting the channel stops the pipe thread if it is idle
        self.frame_sender.take();

        if let Some(mut child) = self.child.take() {
            // A blocked write fails with EPIPE once the child is gone
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.pipe_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
