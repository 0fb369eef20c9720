use crate::{AnnotationStep, ReadOutcome, StreamConfig, StreamController, StreamError, StreamStatus};
use posture_com::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Sent to the client while no session is active.
pub const INACTIVE_MESSAGE: &str = "stream inactive";
/// Sent once when the source ends or fails.
pub const STOPPED_MESSAGE: &str = "stream stopped";

/// Why [`StreamPump::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpExit {
    /// The source reached end of stream or failed.
    SourceEnded,
    TransportClosed,
    Shutdown,
    DetectorNotReady,
}

/// Per-client loop: read, annotate, encode, send, pause.
///
/// Frames are handled inline, so at most one frame is in flight and the pause
/// after each send caps the rate at one frame per `frame_interval`.
pub struct StreamPump {
    controller: Arc<StreamController>,
    annotator: Arc<AnnotationStep>,
    config: StreamConfig,
    shutdown: Option<watch::Receiver<bool>>,
    // last session a frame was read from, 0 before the first
    serving: Arc<AtomicU64>,
    frames_sent: u64,
    frames_skipped: u64,
}

impl StreamPump {
    pub fn new(controller: Arc<StreamController>, annotator: Arc<AnnotationStep>, config: StreamConfig) -> Self {
        Self {
            controller,
            annotator,
            config,
            shutdown: None,
            serving: Arc::new(AtomicU64::new(0)),
            frames_sent: 0,
            frames_skipped: 0,
        }
    }

    /// Exit as soon as `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Serve `transport` until it disconnects, the source ends, or shutdown.
    ///
    /// Whatever the exit, the session this pump serves is stopped before
    /// returning. That includes a panic in the loop and the future being
    /// dropped mid-frame. A session started after the pump's last read is
    /// left running.
    pub async fn run<T: Transport>(&mut self, transport: &mut T) -> PumpExit {
        let _stop = StopOnExit {
            controller: self.controller.clone(),
            serving: self.serving.clone(),
        };
        let exit = self.pump(transport).await;
        log::info!(
            "stream pump exited ({exit:?}): {} frames sent, {} skipped",
            self.frames_sent,
            self.frames_skipped
        );
        exit
    }

    async fn pump<T: Transport>(&mut self, transport: &mut T) -> PumpExit {
        loop {
            if self.shutdown_requested() {
                return PumpExit::Shutdown;
            }
            if transport.is_closed() {
                return PumpExit::TransportClosed;
            }

            // sources block, keep the read off the reactor
            let controller = self.controller.clone();
            let outcome = match tokio::task::spawn_blocking(move || controller.read_frame()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("frame read failed: {e}");
                    let _ = transport.send_text(STOPPED_MESSAGE).await;
                    return PumpExit::SourceEnded;
                }
            };

            let (frame, generation) = match outcome {
                ReadOutcome::Frame { frame, generation } => {
                    self.serving.store(generation, Ordering::Release);
                    (frame, generation)
                }
                ReadOutcome::Inactive => {
                    if transport.send_text(INACTIVE_MESSAGE).await.is_err() {
                        return PumpExit::TransportClosed;
                    }
                    if let Some(exit) = self.pause(transport, self.config.idle_interval()).await {
                        return exit;
                    }
                    continue;
                }
                ReadOutcome::Failed { generation, error } => {
                    self.serving.store(generation, Ordering::Release);
                    log::warn!("{error}, ending session {generation}");
                    let _ = transport.send_text(STOPPED_MESSAGE).await;
                    self.controller.stop_session(generation);
                    return PumpExit::SourceEnded;
                }
            };

            let frame = match self.config.resize() {
                Some((w, h)) if (w, h) != (frame.width(), frame.height()) => match frame.resized(w, h) {
                    Ok(resized) => resized,
                    Err(e) => {
                        log::warn!("skipping frame, resize failed: {e}");
                        self.frames_skipped += 1;
                        continue;
                    }
                },
                _ => frame,
            };

            match self.annotator.annotate(&frame, self.config.confidence_threshold()) {
                Ok(annotated) => {
                    if transport.send_binary(annotated.encoded).await.is_err() {
                        return PumpExit::TransportClosed;
                    }
                    self.frames_sent += 1;
                }
                Err(StreamError::DetectorNotReady(reason)) => {
                    log::error!("detector not ready: {reason}");
                    let _ = transport.send_text(STOPPED_MESSAGE).await;
                    self.controller.stop_session(generation);
                    return PumpExit::DetectorNotReady;
                }
                Err(e) => {
                    log::warn!("skipping frame: {e}");
                    self.frames_skipped += 1;
                }
            }

            if let Some(exit) = self.pause(transport, self.config.frame_interval()).await {
                return exit;
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn pause<T: Transport>(&mut self, transport: &mut T, duration: Duration) -> Option<PumpExit> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => None,
            _ = transport.closed() => Some(PumpExit::TransportClosed),
            _ = wait_for_shutdown(&mut self.shutdown) => Some(PumpExit::Shutdown),
        }
    }
}

/// On drop, stops the last session the pump read from, or whatever is
/// active if it never read a frame.
struct StopOnExit {
    controller: Arc<StreamController>,
    serving: Arc<AtomicU64>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        match self.serving.load(Ordering::Acquire) {
            0 => {
                if self.controller.status() == StreamStatus::Active {
                    self.controller.stop();
                }
            }
            generation => {
                self.controller.stop_session(generation);
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    // no shutdown signal, or its sender is gone
    std::future::pending::<()>().await
}
