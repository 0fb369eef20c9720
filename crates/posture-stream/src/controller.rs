use crate::StreamError;
use posture_image::Frame;
use posture_video::{FrameSource, SourceDescriptor, SourceOpener, VideoError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Stopped,
    Active,
    /// The source is being released.
    Stopping,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Stopped => "stopped",
            StreamStatus::Active => "active",
            StreamStatus::Stopping => "stopping",
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => StreamStatus::Active,
            2 => StreamStatus::Stopping,
            _ => StreamStatus::Stopped,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

impl StartOutcome {
    /// Wire name used by the control endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            StartOutcome::Started => "activated",
            StartOutcome::AlreadyActive => "already-active",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

impl StopOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopOutcome::Stopped => "stopped",
            StopOutcome::AlreadyStopped => "already-stopped",
        }
    }
}

/// Read-only view of the active source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub descriptor: SourceDescriptor,
    pub frames_read: u64,
    /// Increases with every successful start.
    pub generation: u64,
}

/// Result of one read through the controller.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame { frame: Frame, generation: u64 },
    /// No session is active, or it was stopped while the read was in flight.
    Inactive,
    /// The source hit end of stream or failed. The session is left active;
    /// the caller ends it with [`StreamController::stop_session`].
    Failed { generation: u64, error: StreamError },
}

type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

struct ActiveSource {
    source: SharedSource,
    info: SourceInfo,
}

struct StreamSession {
    // Some iff status is Active
    active: Option<ActiveSource>,
    // stopped mid-read, closed by the reader or the next start
    detached: Option<SharedSource>,
    generation: u64,
}

/// Owns the process-wide stream session.
///
/// Every transition happens under the session lock. Reads hold only the
/// source's own lock, so `stop` never waits for a slow device. When a read
/// is in flight, `stop` detaches the session and leaves the status at
/// `Stopping`; the reader closes the source when it returns and completes
/// the move to `Stopped`. `status()` is lock-free so it can be polled while
/// a transition is in progress.
pub struct StreamController {
    opener: Arc<dyn SourceOpener>,
    default_source: SourceDescriptor,
    session: Mutex<StreamSession>,
    status: AtomicU8,
}

impl StreamController {
    pub fn new(opener: Arc<dyn SourceOpener>, default_source: SourceDescriptor) -> Self {
        Self {
            opener,
            default_source,
            session: Mutex::new(StreamSession {
                active: None,
                detached: None,
                generation: 0,
            }),
            status: AtomicU8::new(StreamStatus::Stopped.to_u8()),
        }
    }

    pub fn default_source(&self) -> &SourceDescriptor {
        &self.default_source
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.status() == StreamStatus::Active
    }

    fn set_status(&self, status: StreamStatus) {
        self.status.store(status.to_u8(), Ordering::Release);
    }

    /// Start streaming from the configured default source.
    pub fn start(&self) -> Result<StartOutcome, StreamError> {
        self.start_with(&self.default_source)
    }

    /// Start streaming from `descriptor`. A no-op while a session is active.
    ///
    /// On open failure the status stays `Stopped` and nothing is retained.
    /// A source still detached from the previous session is closed first,
    /// waiting out its pending read.
    pub fn start_with(&self, descriptor: &SourceDescriptor) -> Result<StartOutcome, StreamError> {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if session.active.is_some() {
            log::debug!("start ignored, stream already active");
            return Ok(StartOutcome::AlreadyActive);
        }
        if let Some(pending) = session.detached.take() {
            pending.lock().unwrap_or_else(|e| e.into_inner()).close();
            self.set_status(StreamStatus::Stopped);
            log::debug!("closed the source left by the previous session");
        }

        let source = self.opener.open(descriptor).map_err(|e| {
            log::warn!("cannot open {descriptor}: {e}");
            StreamError::SourceUnavailable(e.to_string())
        })?;

        session.generation += 1;
        let info = SourceInfo {
            descriptor: descriptor.clone(),
            frames_read: 0,
            generation: session.generation,
        };
        session.active = Some(ActiveSource {
            source: Arc::new(Mutex::new(source)),
            info,
        });
        self.set_status(StreamStatus::Active);

        log::info!("stream started from {descriptor} (session {})", session.generation);
        Ok(StartOutcome::Started)
    }

    /// Stop the active session, closing its source. A no-op when stopped.
    pub fn stop(&self) -> StopOutcome {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        self.release(&mut session)
    }

    /// Stop the session only if it is still session `generation`.
    ///
    /// Lets a pump end the session it was reading from without tearing down a
    /// newer one started in the meantime.
    pub fn stop_session(&self, generation: u64) -> StopOutcome {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let current = session.active.as_ref().map(|active| active.info.generation);
        if current != Some(generation) {
            return StopOutcome::AlreadyStopped;
        }
        self.release(&mut session)
    }

    fn release(&self, session: &mut StreamSession) -> StopOutcome {
        let Some(active) = session.active.take() else {
            return StopOutcome::AlreadyStopped;
        };
        let info = active.info;

        self.set_status(StreamStatus::Stopping);
        let closed = match active.source.try_lock() {
            Ok(mut source) => {
                source.close();
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().close();
                true
            }
            Err(TryLockError::WouldBlock) => {
                session.detached = Some(active.source.clone());
                false
            }
        };

        if closed {
            self.set_status(StreamStatus::Stopped);
            log::info!(
                "stream stopped: {} after {} frames (session {})",
                info.descriptor,
                info.frames_read,
                info.generation
            );
        } else {
            log::info!(
                "stream stopping: {} closes once its pending read returns (session {})",
                info.descriptor,
                info.generation
            );
        }
        StopOutcome::Stopped
    }

    /// Snapshot of the active source, if any. The handle itself is never exposed.
    pub fn current_source(&self) -> Option<SourceInfo> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.active.as_ref().map(|active| active.info.clone())
    }

    /// Read the next frame from the active source.
    ///
    /// Blocks for as long as the source does, without holding the session
    /// lock.
    pub fn read_frame(&self) -> ReadOutcome {
        let (source, generation) = {
            let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            let Some(active) = session.active.as_ref() else {
                return ReadOutcome::Inactive;
            };
            (active.source.clone(), active.info.generation)
        };

        let result = source.lock().unwrap_or_else(|e| e.into_inner()).read_next();

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let active = match session.active.as_mut() {
            Some(active) if active.info.generation == generation => active,
            _ => {
                // stopped or replaced while reading
                source.lock().unwrap_or_else(|e| e.into_inner()).close();
                if session.detached.as_ref().is_some_and(|d| Arc::ptr_eq(d, &source)) {
                    session.detached = None;
                }
                if session.active.is_none() && session.detached.is_none() {
                    self.set_status(StreamStatus::Stopped);
                }
                log::debug!("discarded a read from stopped session {generation}");
                return ReadOutcome::Inactive;
            }
        };

        match result {
            Ok(frame) => {
                active.info.frames_read += 1;
                ReadOutcome::Frame { frame, generation }
            }
            Err(VideoError::EndOfStream) => ReadOutcome::Failed {
                generation,
                error: StreamError::ReadFailure("end of stream".to_string()),
            },
            Err(e) => ReadOutcome::Failed {
                generation,
                error: StreamError::ReadFailure(e.to_string()),
            },
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();
    }
}
