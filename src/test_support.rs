//! Scripted encoder sessions for driving the capture component in tests
//!
//! Enabled for unit tests and with the `test-harness` feature.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoding::{EncoderError, EncoderSession, Result, SessionFactory, SessionRequest};

/// One call observed by a [`RecordingSession`], in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Push(Vec<u8>),
    Skip,
    Complete,
    Close,
    Dispose,
}

/// Everything a recording session has seen
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    pub events: Vec<SessionEvent>,
    pub pushes: Vec<Vec<u8>>,
    pub skips: usize,
    pub completes: usize,
    pub closes: usize,
    pub disposes: usize,
}

/// Session that records calls instead of encoding
#[derive(Debug, Default)]
pub struct RecordingSession {
    log: Arc<Mutex<SessionLog>>,
    fail_pushes_after: Option<usize>,
    fail_completes_after: Option<usize>,
    closed: bool,
}

impl RecordingSession {
    fn with_log(log: Arc<Mutex<SessionLog>>) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Snapshot of the calls so far
    pub fn log(&self) -> SessionLog {
        self.log.lock().clone()
    }

    /// Make every frame push after the first `n` fail like a broken pipe
    pub fn fail_pushes_after(&mut self, n: usize) {
        self.fail_pushes_after = Some(n);
    }

    /// Make every checkpoint after the first `n` fail like a broken pipe
    pub fn fail_completes_after(&mut self, n: usize) {
        self.fail_completes_after = Some(n);
    }
}

impl EncoderSession for RecordingSession {
    fn push_frame(&mut self, frame: Option<&[u8]>) -> Result<()> {
        if self.closed {
            return Err(EncoderError::Closed);
        }
        let mut log = self.log.lock();
        match frame {
            Some(pixels) => {
                if self.fail_pushes_after.is_some_and(|n| log.pushes.len() >= n) {
                    return Err(EncoderError::Pipe("scripted pipe failure".into()));
                }
                log.pushes.push(pixels.to_vec());
                log.events.push(SessionEvent::Push(pixels.to_vec()));
            }
            None => {
                log.skips += 1;
                log.events.push(SessionEvent::Skip);
            }
        }
        Ok(())
    }

    fn complete_pending_pushes(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let mut log = self.log.lock();
        if self.fail_completes_after.is_some_and(|n| log.completes >= n) {
            return Err(EncoderError::Pipe("scripted checkpoint failure".into()));
        }
        log.completes += 1;
        log.events.push(SessionEvent::Complete);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut log = self.log.lock();
        log.closes += 1;
        log.events.push(SessionEvent::Close);
        Ok(())
    }

    fn dispose(&mut self) {
        self.closed = true;
        let mut log = self.log.lock();
        log.disposes += 1;
        log.events.push(SessionEvent::Dispose);
    }
}

/// Factory handing out [`RecordingSession`]s and remembering every request
#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    logs: Arc<Mutex<Vec<Arc<Mutex<SessionLog>>>>>,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
    fail_create: bool,
    fail_pushes_after: Option<usize>,
    fail_completes_after: Option<usize>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `create` call fails like a missing encoder binary
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    /// Sessions created from now on fail frame pushes after `n` frames
    pub fn with_push_failure_after(mut self, n: usize) -> Self {
        self.fail_pushes_after = Some(n);
        self
    }

    /// Sessions created from now on fail checkpoints after `n` flushes
    pub fn with_complete_failure_after(mut self, n: usize) -> Self {
        self.fail_completes_after = Some(n);
        self
    }

    pub fn sessions_created(&self) -> usize {
        self.logs.lock().len()
    }

    /// Log of the `index`-th session created
    pub fn session_log(&self, index: usize) -> SessionLog {
        self.logs.lock()[index].lock().clone()
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().clone()
    }
}

impl SessionFactory for RecordingFactory {
    type Session = RecordingSession;

    fn create(&self, request: &SessionRequest) -> Result<RecordingSession> {
        self.requests.lock().push(request.clone());
        if self.fail_create {
            return Err(EncoderError::Launch("scripted launch failure".into()));
        }
        let log = Arc::new(Mutex::new(SessionLog::default()));
        self.logs.lock().push(log.clone());

        let mut session = RecordingSession::with_log(log);
        if let Some(n) = self.fail_pushes_after {
            session.fail_pushes_after(n);
        }
        if let Some(n) = self.fail_completes_after {
            session.fail_completes_after(n);
        }
        Ok(session)
    }
}
