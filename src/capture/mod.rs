// Fixed-rate video capture for a render loop
//
// The host calls into `VideoCapture` from its render thread:
// - `on_render_image()` once per rendered frame, with the frame and the time
// - `end_of_frame()` once all rendering for the frame has finished
// - `disable()` to stop capturing (flushes, closes and disposes the session)
//
// The encoder session is created lazily on the first rendered frame, and the
// timeline starts at that frame's time.

pub mod diagnostics;
pub mod frame_buffer;
pub mod pacing;
pub mod sync;
pub mod timeline;

pub use diagnostics::{DropCounter, DROP_WARNING_THRESHOLD};
pub use frame_buffer::{FrameBuffer, FrameView};
pub use pacing::{decide, CatchUpPolicy, PacingDecision, PacingPlan};
pub use sync::{EndOfFrameSync, SyncState};
pub use timeline::Timeline;

use serde::Serialize;
use std::path::PathBuf;

use crate::config::{CaptureConfig, CaptureSettings, ConfigError};
use crate::encoding::{EncoderError, EncoderSession, SessionFactory, SessionRequest};

/// Error type for capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Invalid capture configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create output folder {path}: {source}")]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create encoder session: {0}")]
    SessionCreation(#[source] EncoderError),

    #[error("Encoder pipe failed: {0}")]
    Pipe(#[source] EncoderError),

    #[error("Capture stopped after an earlier failure: {0}")]
    Stopped(String),

    #[error("Render time must be finite (got {0})")]
    InvalidTime(f64),

    #[error("Malformed source frame: {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Current capture status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// No session; the next rendered frame starts one
    Idle,
    /// Session open, frames are being pushed
    Capturing,
    /// A session failed; nothing is pushed until `disable()`
    Failed,
}

/// What happened on one render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub decision: PacingDecision,
    /// Copies of the frame pushed this tick
    pub pushes: u64,
    /// Emitted frame count after the tick
    pub emitted: u64,
    /// Whether this tick started the session
    pub session_started: bool,
}

/// Counters for a capture session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureStats {
    pub output_path: PathBuf,
    pub frame_rate: f64,
    /// Render ticks seen by the session
    pub ticks: u64,
    /// Ticks that pushed nothing
    pub skips: u64,
    /// Frames on the output timeline
    pub frames_emitted: u64,
    /// Frames actually handed to the encoder
    pub frames_pushed: u64,
    /// Ticks that needed a catch-up
    pub catch_ups: u32,
    /// Timeline slots with no frame because a burst was capped
    pub frames_omitted: u64,
}

/// State for an open session
struct ActiveCapture<S> {
    session: S,
    config: CaptureConfig,
    output_path: PathBuf,
    timeline: Timeline,
    drops: DropCounter,
    ticks: u64,
    skips: u64,
    frames_pushed: u64,
    frames_omitted: u64,
}

impl<S> ActiveCapture<S> {
    fn stats(&self) -> CaptureStats {
        CaptureStats {
            output_path: self.output_path.clone(),
            frame_rate: self.config.frame_rate,
            ticks: self.ticks,
            skips: self.skips,
            frames_emitted: self.timeline.emitted(),
            frames_pushed: self.frames_pushed,
            catch_ups: self.drops.count(),
            frames_omitted: self.frames_omitted,
        }
    }
}

enum CaptureState<S> {
    Idle,
    Active(Box<ActiveCapture<S>>),
    Failed(String),
}

/// Captures a render loop into an encoder session at a fixed frame rate
pub struct VideoCapture<F: SessionFactory> {
    /// Identifying name, used for the output file
    name: String,
    settings: CaptureSettings,
    factory: F,
    buffer: FrameBuffer,
    sync: EndOfFrameSync,
    state: CaptureState<F::Session>,
}

impl<F: SessionFactory> VideoCapture<F> {
    pub fn new(name: impl Into<String>, mut settings: CaptureSettings, factory: F) -> Self {
        settings.clamp_dimensions();
        Self {
            name: name.into(),
            settings,
            factory,
            buffer: FrameBuffer::new(),
            sync: EndOfFrameSync::new(),
            state: CaptureState::Idle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Edit the settings. Changes apply to the next session, never to the
    /// one currently running.
    pub fn settings_mut(&mut self) -> &mut CaptureSettings {
        &mut self.settings
    }

    pub fn status(&self) -> CaptureStatus {
        match self.state {
            CaptureState::Idle => CaptureStatus::Idle,
            CaptureState::Active(_) => CaptureStatus::Capturing,
            CaptureState::Failed(_) => CaptureStatus::Failed,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, CaptureState::Active(_))
    }

    /// Reason the capture stopped, if it failed
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            CaptureState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Configuration of the running session
    pub fn active_config(&self) -> Option<&CaptureConfig> {
        match &self.state {
            CaptureState::Active(active) => Some(&active.config),
            _ => None,
        }
    }

    /// Counters of the running session
    pub fn stats(&self) -> Option<CaptureStats> {
        match &self.state {
            CaptureState::Active(active) => Some(active.stats()),
            _ => None,
        }
    }

    /// The capture buffer (last rendered frame at capture size)
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Handle one rendered frame
    ///
    /// `now` is the wall-clock time of this render tick in seconds. Starts the
    /// session on the first call, then pushes 0..N copies of the frame
    /// depending on how far the output timeline lags behind `now`.
    pub fn on_render_image(&mut self, now: f64, source: &FrameView<'_>) -> Result<TickReport> {
        if let CaptureState::Failed(reason) = &self.state {
            return Err(CaptureError::Stopped(reason.clone()));
        }
        if !now.is_finite() {
            return Err(CaptureError::InvalidTime(now));
        }
        if !source.is_well_formed() {
            return Err(CaptureError::InvalidFrame {
                width: source.width,
                height: source.height,
                len: source.data.len(),
            });
        }

        let session_started = if matches!(self.state, CaptureState::Idle) {
            self.start_session(now)?;
            true
        } else {
            false
        };

        let CaptureState::Active(active) = &mut self.state else {
            return Err(CaptureError::Stopped("no active session".into()));
        };

        self.buffer.blit_from(source);

        let decision = decide(now, active.timeline.ideal_time(), active.config.frame_rate);
        let plan = active.config.catch_up.plan(decision);

        if decision.is_catch_up() {
            active.drops.record();
            if plan.omitted > 0 {
                log::warn!(
                    "Catch-up of {} frames capped at {} pushes; {} frames left out of {}",
                    plan.advance,
                    plan.pushes,
                    plan.omitted,
                    self.name
                );
            }
        }

        let pushed = if plan.pushes == 0 {
            active.session.push_frame(None)
        } else {
            (0..plan.pushes).try_for_each(|_| active.session.push_frame(Some(self.buffer.pixels())))
        };

        if let Err(e) = pushed {
            return Err(self.fail(e));
        }

        let CaptureState::Active(active) = &mut self.state else {
            return Err(CaptureError::Stopped("no active session".into()));
        };
        active.timeline.advance(plan.advance);
        active.ticks += 1;
        active.frames_pushed += plan.pushes;
        active.frames_omitted += plan.omitted;
        if plan.pushes == 0 {
            active.skips += 1;
        }

        Ok(TickReport {
            decision,
            pushes: plan.pushes,
            emitted: active.timeline.emitted(),
            session_started,
        })
    }

    /// Signal that all rendering for `frame_index` is complete
    ///
    /// Flushes the session once per frame index. Safe to call every frame,
    /// with or without a session.
    pub fn end_of_frame(&mut self, frame_index: u64) -> Result<bool> {
        let CaptureState::Active(active) = &mut self.state else {
            return Ok(false);
        };

        match self.sync.end_of_frame(frame_index, &mut active.session) {
            Ok(flushed) => Ok(flushed),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Stop capturing
    ///
    /// Pending pushes are flushed, then the session is closed and disposed.
    /// The component always ends up idle, even when flushing or closing
    /// fails; the first such error is returned. Returns the session's
    /// counters when a session was open.
    pub fn disable(&mut self) -> Result<Option<CaptureStats>> {
        self.sync.deactivate();
        self.buffer.release();

        let active = match std::mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::Active(active) => active,
            CaptureState::Failed(reason) => {
                log::info!("Clearing failed capture {}: {}", self.name, reason);
                return Ok(None);
            }
            CaptureState::Idle => return Ok(None),
        };

        let mut active = *active;
        let stats = active.stats();

        let flushed = active.session.complete_pending_pushes();
        let closed = active.session.close();
        active.session.dispose();

        log::info!(
            "Capture {} stopped: {} ticks, {} frames emitted, {} pushed",
            self.name,
            stats.ticks,
            stats.frames_emitted,
            stats.frames_pushed
        );

        flushed.and(closed).map_err(CaptureError::Pipe)?;
        Ok(Some(stats))
    }

    fn start_session(&mut self, now: f64) -> Result<()> {
        let config = self.settings.validate(&self.name)?;

        let folder = self.settings.output_folder();
        if let Err(source) = std::fs::create_dir_all(&folder) {
            let err = CaptureError::OutputFolder { path: folder, source };
            log::error!("{}", err);
            self.state = CaptureState::Failed(err.to_string());
            return Err(err);
        }

        let request = SessionRequest {
            output_path_prefix: config.output_path_prefix.clone(),
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
            preset: config.preset,
        };

        let session = match self.factory.create(&request) {
            Ok(session) => session,
            Err(e) => {
                let err = CaptureError::SessionCreation(e);
                log::error!("Capture {}: {}", self.name, err);
                self.state = CaptureState::Failed(err.to_string());
                return Err(err);
            }
        };

        log::info!(
            "Capture {} started: {}x{} @ {} fps -> {}",
            self.name,
            config.width,
            config.height,
            config.frame_rate,
            request.output_path().display()
        );

        self.buffer.ensure_size(config.width, config.height);
        self.sync.activate();
        self.state = CaptureState::Active(Box::new(ActiveCapture {
            session,
            output_path: request.output_path(),
            timeline: Timeline::new(now, config.frame_rate),
            config,
            drops: DropCounter::new(),
            ticks: 0,
            skips: 0,
            frames_pushed: 0,
            frames_omitted: 0,
        }));
        Ok(())
    }

    /// Tear down after a pipe failure; no retry until `disable()`
    fn fail(&mut self, error: EncoderError) -> CaptureError {
        log::error!("Capture {} failed: {}", self.name, error);
        self.sync.deactivate();

        if let CaptureState::Active(mut active) =
            std::mem::replace(&mut self.state, CaptureState::Failed(error.to_string()))
        {
            active.session.dispose();
        }
        CaptureError::Pipe(error)
    }
}

impl<F: SessionFactory> Drop for VideoCapture<F> {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            log::warn!("Capture {} did not shut down cleanly: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::pacing::DEFAULT_MAX_BURST;
    use crate::encoding::Preset;
    use crate::test_support::{RecordingFactory, SessionEvent};

    const RATE: f64 = 60.0;

    fn settings_in(dir: &std::path::Path) -> CaptureSettings {
        CaptureSettings {
            width: 8,
            height: 8,
            frame_rate: RATE,
            folder: Some(dir.to_path_buf()),
            ..CaptureSettings::default()
        }
    }

    fn frame(value: u8) -> Vec<u8> {
        vec![value; 8 * 8 * 4]
    }

    #[test]
    fn first_tick_starts_session_and_emits_once() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());

        let pixels = frame(1);
        let report = capture.on_render_image(0.0, &FrameView::new(8, 8, &pixels)).unwrap();

        assert!(report.session_started);
        assert_eq!(report.decision, PacingDecision::EmitOnce);
        assert_eq!(report.emitted, 1);
        assert_eq!(factory.sessions_created(), 1);

        let request = &factory.requests()[0];
        assert_eq!(request.output_path_prefix, dir.path().join("cam"));
        assert_eq!(request.preset, Preset::H264Default);
    }

    #[test]
    fn stall_catches_up_and_counts_a_drop() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        let report = capture.on_render_image(0.05, &view).unwrap();

        assert_eq!(report.decision, PacingDecision::EmitCatchUp(2));
        assert_eq!(report.emitted, 3);
        let stats = capture.stats().unwrap();
        assert_eq!(stats.catch_ups, 1);
        assert_eq!(stats.frames_pushed, 3);
    }

    #[test]
    fn running_ahead_pushes_skip_markers() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(3);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        // Next ideal time is 1/120; a tick at 0.001 is early
        let report = capture.on_render_image(0.001, &view).unwrap();
        assert_eq!(report.decision, PacingDecision::Skip);
        assert_eq!(report.emitted, 1);

        let log = factory.session_log(0);
        assert_eq!(log.pushes.len(), 1);
        assert_eq!(log.skips, 1);
    }

    #[test]
    fn duplicates_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());

        capture.on_render_image(0.0, &FrameView::new(8, 8, &frame(1))).unwrap();
        // ideal = 1/120, gap = 1.5 intervals -> EmitTwice
        let report = capture
            .on_render_image(1.0 / 120.0 + 1.5 / 60.0, &FrameView::new(8, 8, &frame(2)))
            .unwrap();
        assert_eq!(report.decision, PacingDecision::EmitTwice);

        let log = factory.session_log(0);
        assert_eq!(log.pushes.len(), 3);
        assert_eq!(log.pushes[1], frame(2));
        assert_eq!(log.pushes[1], log.pushes[2]);
    }

    #[test]
    fn long_stall_is_capped_by_burst_limit() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut settings = settings_in(dir.path());
        settings.catch_up = CatchUpPolicy::Duplicate { max_burst: 5 };
        let mut capture = VideoCapture::new("cam", settings, factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        let report = capture.on_render_image(3.0, &view).unwrap();

        assert!(report.decision.is_catch_up());
        assert_eq!(report.pushes, 5);
        // The timeline is re-anchored to the wall clock regardless of the cap
        assert_eq!(report.emitted, 1 + report.decision.frames());
        assert_eq!(factory.session_log(0).pushes.len(), 6);
        assert!(capture.stats().unwrap().frames_omitted > 0);
    }

    #[test]
    fn end_of_frame_flushes_once_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());

        // No session yet: nothing to flush
        assert!(!capture.end_of_frame(0).unwrap());

        capture.on_render_image(0.0, &FrameView::new(8, 8, &frame(1))).unwrap();
        assert!(capture.end_of_frame(0).unwrap());
        assert!(!capture.end_of_frame(0).unwrap());
        assert!(capture.end_of_frame(1).unwrap());

        assert_eq!(factory.session_log(0).completes, 2);
    }

    #[test]
    fn teardown_flushes_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());

        capture.on_render_image(0.0, &FrameView::new(8, 8, &frame(1))).unwrap();
        let stats = capture.disable().unwrap().unwrap();
        assert_eq!(stats.frames_emitted, 1);
        assert_eq!(capture.status(), CaptureStatus::Idle);

        let events = factory.session_log(0).events;
        let tail: Vec<_> = events.iter().rev().take(3).rev().cloned().collect();
        assert_eq!(tail, vec![SessionEvent::Complete, SessionEvent::Close, SessionEvent::Dispose]);

        // Idle again: a second disable is a no-op
        assert!(capture.disable().unwrap().is_none());
        assert!(!capture.end_of_frame(7).unwrap());
    }

    #[test]
    fn pipe_failure_stops_pushing_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new().with_push_failure_after(2);
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        // EmitTwice: second push fails
        let err = capture.on_render_image(1.0 / 120.0 + 1.5 / 60.0, &view).unwrap_err();
        assert!(matches!(err, CaptureError::Pipe(_)));
        assert_eq!(capture.status(), CaptureStatus::Failed);
        assert!(capture.failure().is_some());

        let err = capture.on_render_image(1.0, &view).unwrap_err();
        assert!(matches!(err, CaptureError::Stopped(_)));
        assert_eq!(factory.sessions_created(), 1);
        assert_eq!(factory.session_log(0).pushes.len(), 2);
        assert_eq!(factory.session_log(0).disposes, 1);

        // Explicit teardown re-arms the component
        capture.disable().unwrap();
        capture.on_render_image(2.0, &view).unwrap();
        assert_eq!(factory.sessions_created(), 2);
    }

    #[test]
    fn session_creation_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::failing();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        let err = capture.on_render_image(0.0, &view).unwrap_err();
        assert!(matches!(err, CaptureError::SessionCreation(_)));
        assert!(matches!(capture.on_render_image(0.1, &view), Err(CaptureError::Stopped(_))));
        assert_eq!(factory.requests().len(), 1);
    }

    #[test]
    fn invalid_config_leaves_component_idle() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut settings = settings_in(dir.path());
        settings.frame_rate = 0.0;
        let mut capture = VideoCapture::new("cam", settings, factory.clone());
        let pixels = frame(1);

        let err = capture.on_render_image(0.0, &FrameView::new(8, 8, &pixels)).unwrap_err();
        assert!(matches!(err, CaptureError::Config(ConfigError::InvalidFrameRate(_))));
        assert_eq!(capture.status(), CaptureStatus::Idle);
        assert!(factory.requests().is_empty());
    }

    #[test]
    fn output_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("a").join("b");
        let factory = RecordingFactory::new();
        let mut settings = settings_in(dir.path());
        settings.folder = Some(folder.clone());
        let mut capture = VideoCapture::new("cam", settings, factory);

        capture.on_render_image(0.0, &FrameView::new(8, 8, &frame(1))).unwrap();
        assert!(folder.is_dir());
    }

    #[test]
    fn settings_changes_wait_for_next_session() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        capture.settings_mut().frame_rate = 30.0;
        capture.settings_mut().width = 16;
        assert_eq!(capture.active_config().unwrap().frame_rate, RATE);
        assert_eq!(capture.frame_buffer().width(), 8);

        capture.disable().unwrap();
        capture.on_render_image(1.0, &view).unwrap();
        assert_eq!(capture.active_config().unwrap().frame_rate, 30.0);
        assert_eq!(capture.frame_buffer().width(), 16);
        assert_eq!(factory.requests()[1].width, 16);
        // The 8x8 source is scaled into the 16x8 buffer
        assert_eq!(factory.session_log(1).pushes[0].len(), 16 * 8 * 4);
    }

    #[test]
    fn non_finite_times_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        // Before the first good tick nothing gets started
        assert!(matches!(capture.on_render_image(f64::NAN, &view), Err(CaptureError::InvalidTime(_))));
        assert_eq!(factory.sessions_created(), 0);

        capture.on_render_image(0.0, &view).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = capture.on_render_image(bad, &view).unwrap_err();
            assert!(matches!(err, CaptureError::InvalidTime(_)));
        }

        assert_eq!(capture.status(), CaptureStatus::Capturing);
        let stats = capture.stats().unwrap();
        assert_eq!(stats.frames_emitted, 1);
        assert_eq!(stats.catch_ups, 0);
        assert_eq!(factory.session_log(0).pushes.len(), 1);
    }

    #[test]
    fn huge_time_jump_saturates_the_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        let report = capture.on_render_image(1e300, &view).unwrap();
        assert_eq!(report.decision, PacingDecision::EmitCatchUp(u64::MAX));
        assert_eq!(report.pushes, u64::from(DEFAULT_MAX_BURST));
        assert_eq!(report.emitted, u64::MAX);
    }

    #[test]
    fn flush_failure_stops_the_capture() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new().with_complete_failure_after(1);
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        capture.on_render_image(0.0, &view).unwrap();
        assert!(capture.end_of_frame(0).unwrap());

        capture.on_render_image(1.0 / 60.0, &view).unwrap();
        let err = capture.end_of_frame(1).unwrap_err();
        assert!(matches!(err, CaptureError::Pipe(_)));
        assert_eq!(capture.status(), CaptureStatus::Failed);

        let pushed = factory.session_log(0).pushes.len();
        assert_eq!(factory.session_log(0).disposes, 1);

        let err = capture.on_render_image(2.0 / 60.0, &view).unwrap_err();
        assert!(matches!(err, CaptureError::Stopped(_)));
        assert!(!capture.end_of_frame(2).unwrap());
        assert_eq!(factory.session_log(0).pushes.len(), pushed);
        assert_eq!(factory.sessions_created(), 1);

        assert!(capture.disable().unwrap().is_none());
        assert_eq!(capture.status(), CaptureStatus::Idle);
    }

    #[test]
    fn uncreatable_folder_fails_before_launching() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a folder").unwrap();

        let factory = RecordingFactory::new();
        let mut settings = settings_in(dir.path());
        settings.folder = Some(blocker.join("out"));
        let mut capture = VideoCapture::new("cam", settings, factory.clone());
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        let err = capture.on_render_image(0.0, &view).unwrap_err();
        assert!(matches!(err, CaptureError::OutputFolder { .. }));
        assert_eq!(capture.status(), CaptureStatus::Failed);
        assert!(factory.requests().is_empty());
        assert!(matches!(capture.on_render_image(0.1, &view), Err(CaptureError::Stopped(_))));
    }

    #[test]
    fn malformed_frames_are_rejected_without_starting() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory.clone());

        let err = capture.on_render_image(0.0, &FrameView::new(8, 8, &[0; 10])).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidFrame { len: 10, .. }));
        assert_eq!(factory.sessions_created(), 0);
    }

    #[test]
    fn emitted_count_is_monotonic_and_sums_increments() {
        let dir = tempfile::tempdir().unwrap();
        let factory = RecordingFactory::new();
        let mut capture = VideoCapture::new("cam", settings_in(dir.path()), factory);
        let pixels = frame(1);
        let view = FrameView::new(8, 8, &pixels);

        // Irregular render times: fast bursts, jitter and a couple of stalls
        let times = [0.0, 0.004, 0.02, 0.021, 0.05, 0.051, 0.2, 0.21, 0.23, 0.9, 0.91, 0.93];
        let mut previous = 0;
        let mut sum = 0;
        for now in times {
            let report = capture.on_render_image(now, &view).unwrap();
            assert!(report.emitted >= previous);
            sum += report.decision.frames();
            previous = report.emitted;
        }
        assert_eq!(capture.stats().unwrap().frames_emitted, sum);
    }
}
