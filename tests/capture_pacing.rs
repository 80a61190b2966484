//! Drives `VideoCapture` through irregular render loops with a manual clock
//! and checks what reaches the encoder.

use std::sync::Arc;

use parking_lot::Mutex;

use framepace::capture::{CatchUpPolicy, FrameView, PacingDecision, DROP_WARNING_THRESHOLD};
use framepace::clock::{Clock, ManualClock};
use framepace::encoding::{EncoderError, EncoderSession, SessionFactory, SessionRequest};
use framepace::{CaptureSettings, CaptureStatus, VideoCapture};

const RATE: f64 = 60.0;
const SIZE: u32 = 8;

#[derive(Debug, Default)]
struct Counts {
    frames: Vec<u8>,
    skips: u64,
    flushes: u64,
    closed: bool,
    disposed: bool,
}

/// Records the first byte of each pushed frame
struct TallySession(Arc<Mutex<Counts>>);

impl EncoderSession for TallySession {
    fn push_frame(&mut self, frame: Option<&[u8]>) -> Result<(), EncoderError> {
        let mut counts = self.0.lock();
        if counts.closed {
            return Err(EncoderError::Closed);
        }
        match frame {
            Some(pixels) => counts.frames.push(pixels[0]),
            None => counts.skips += 1,
        }
        Ok(())
    }

    fn complete_pending_pushes(&mut self) -> Result<(), EncoderError> {
        self.0.lock().flushes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        self.0.lock().closed = true;
        Ok(())
    }

    fn dispose(&mut self) {
        self.0.lock().disposed = true;
    }
}

#[derive(Clone, Default)]
struct TallyFactory(Arc<Mutex<Counts>>);

impl SessionFactory for TallyFactory {
    type Session = TallySession;

    fn create(&self, _request: &SessionRequest) -> Result<TallySession, EncoderError> {
        let mut counts = self.0.lock();
        counts.closed = false;
        counts.disposed = false;
        drop(counts);
        Ok(TallySession(self.0.clone()))
    }
}

fn settings(dir: &std::path::Path) -> CaptureSettings {
    CaptureSettings {
        width: SIZE,
        height: SIZE,
        frame_rate: RATE,
        folder: Some(dir.to_path_buf()),
        ..CaptureSettings::default()
    }
}

fn solid(value: u8) -> Vec<u8> {
    vec![value; (SIZE * SIZE * 4) as usize]
}

#[test]
fn timeline_tracks_wall_clock_through_jitter_and_stalls() {
    let dir = tempfile::tempdir().unwrap();
    let factory = TallyFactory::default();
    let mut capture = VideoCapture::new("jitter", settings(dir.path()), factory.clone());
    let clock = ManualClock::new(10.0);
    let start = clock.now();

    // Render loop at roughly 144 Hz with jitter and a stall every 50 ticks
    for tick in 0..600u64 {
        let pixels = solid((tick % 251) as u8);
        let now = clock.now();
        let report = capture
            .on_render_image(now, &FrameView::new(SIZE, SIZE, &pixels))
            .unwrap();
        capture.end_of_frame(tick).unwrap();

        // Never more than one interval behind, never more than one and a half ahead
        let elapsed_frames = (now - start) * RATE;
        assert!(report.emitted as f64 > elapsed_frames - 0.5 - 1e-9);
        assert!((report.emitted as f64) < elapsed_frames + 1.5 + 1e-9);

        let jitter = [0.0, 0.002, -0.001, 0.003][(tick % 4) as usize];
        let stall = if tick % 50 == 49 { 0.12 } else { 0.0 };
        clock.advance(1.0 / 144.0 + jitter + stall);
    }

    let stats = capture.disable().unwrap().unwrap();
    let counts = factory.0.lock();
    assert_eq!(stats.ticks, 600);
    assert_eq!(stats.frames_emitted, counts.frames.len() as u64);
    assert_eq!(stats.skips, counts.skips);
    // Stalls before ticks 50, 100, ..., 550
    assert_eq!(stats.catch_ups, 11);
    // One flush per frame plus the teardown flush
    assert_eq!(counts.flushes, 601);
    assert!(counts.closed && counts.disposed);
}

#[test]
fn worked_example_from_first_frame_through_a_stall() {
    let dir = tempfile::tempdir().unwrap();
    let factory = TallyFactory::default();
    let mut capture = VideoCapture::new("example", settings(dir.path()), factory.clone());

    let first = capture.on_render_image(0.0, &FrameView::new(SIZE, SIZE, &solid(1))).unwrap();
    assert_eq!(first.decision, PacingDecision::EmitOnce);
    assert_eq!(first.emitted, 1);

    let stalled = capture.on_render_image(0.05, &FrameView::new(SIZE, SIZE, &solid(2))).unwrap();
    assert_eq!(stalled.decision, PacingDecision::EmitCatchUp(2));
    assert_eq!(stalled.emitted, 3);
    assert_eq!(capture.stats().unwrap().catch_ups, 1);

    assert_eq!(factory.0.lock().frames, vec![1, 2, 2]);
}

#[test]
fn single_policy_pushes_once_per_catch_up() {
    let dir = tempfile::tempdir().unwrap();
    let factory = TallyFactory::default();
    let mut settings = settings(dir.path());
    settings.catch_up = CatchUpPolicy::Single;
    let mut capture = VideoCapture::new("single", settings, factory.clone());

    capture.on_render_image(0.0, &FrameView::new(SIZE, SIZE, &solid(1))).unwrap();
    let report = capture.on_render_image(1.0, &FrameView::new(SIZE, SIZE, &solid(2))).unwrap();

    assert_eq!(report.decision, PacingDecision::EmitCatchUp(59));
    assert_eq!(report.pushes, 1);
    assert_eq!(report.emitted, 60);
    assert_eq!(factory.0.lock().frames, vec![1, 2]);
    assert_eq!(capture.stats().unwrap().frames_omitted, 58);
}

#[test]
fn drop_counter_resets_with_each_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut capture = VideoCapture::new("drops", settings(dir.path()), TallyFactory::default());
    let pixels = solid(0);
    let view = FrameView::new(SIZE, SIZE, &pixels);

    let mut now = 0.0;
    capture.on_render_image(now, &view).unwrap();
    for _ in 0..DROP_WARNING_THRESHOLD + 2 {
        now += 0.1;
        capture.on_render_image(now, &view).unwrap();
    }
    assert_eq!(capture.stats().unwrap().catch_ups, DROP_WARNING_THRESHOLD + 2);

    capture.disable().unwrap();
    capture.on_render_image(now + 1.0, &view).unwrap();
    assert_eq!(capture.stats().unwrap().catch_ups, 0);
}

#[test]
fn output_is_named_after_folder_name_and_preset() {
    let dir = tempfile::tempdir().unwrap();
    let mut capture = VideoCapture::new("Main Camera", settings(dir.path()), TallyFactory::default());
    capture.on_render_image(0.0, &FrameView::new(SIZE, SIZE, &solid(0))).unwrap();

    let stats = capture.stats().unwrap();
    assert_eq!(stats.output_path, dir.path().join("Main Camera.mp4"));

    capture.disable().unwrap();
    assert_eq!(capture.status(), CaptureStatus::Idle);
}
