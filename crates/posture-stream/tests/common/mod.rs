#![allow(dead_code)]

use posture_com::{ComError, Transport};
use posture_image::{Frame, FrameEncoder, ImageError};
use posture_video::{FrameSource, SourceDescriptor, SourceOpener, SyntheticSpec, VideoError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Text(String),
    Binary(Vec<u8>),
}

/// In-memory transport. Records every message with the time it was sent.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<(Instant, Sent)>>>,
    closed: Arc<watch::Sender<bool>>,
    // disconnect after this many binary frames
    close_after: Option<usize>,
}

/// Test-side view of a [`MockTransport`].
#[derive(Clone)]
pub struct MockPeer {
    sent: Arc<Mutex<Vec<(Instant, Sent)>>>,
    closed: Arc<watch::Sender<bool>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockPeer) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(watch::channel(false).0);
        let peer = MockPeer {
            sent: sent.clone(),
            closed: closed.clone(),
        };
        (
            Self {
                sent,
                closed,
                close_after: None,
            },
            peer,
        )
    }

    pub fn close_after(mut self, frames: usize) -> Self {
        self.close_after = Some(frames);
        self
    }

    fn push(&self, msg: Sent) -> Result<(), ComError> {
        if *self.closed.borrow() {
            return Err(ComError::ConnectionClosed);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((Instant::now(), msg));
        if let Some(limit) = self.close_after {
            let frames = sent.iter().filter(|(_, m)| matches!(m, Sent::Binary(_))).count();
            if frames >= limit {
                self.closed.send_replace(true);
            }
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), ComError> {
        self.push(Sent::Text(text.to_string()))
    }

    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), ComError> {
        self.push(Sent::Binary(payload))
    }

    async fn closed(&mut self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl MockPeer {
    pub fn disconnect(&self) {
        self.closed.send_replace(true);
    }

    pub fn messages(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn timed(&self) -> Vec<(Instant, Sent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Sent::Text(t) => Some(t),
                Sent::Binary(_) => None,
            })
            .collect()
    }

    pub fn binaries(&self) -> Vec<Vec<u8>> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Sent::Binary(b) => Some(b),
                Sent::Text(_) => None,
            })
            .collect()
    }
}

/// Counters shared between a [`CountingOpener`] and the test.
#[derive(Clone, Default)]
pub struct Counters {
    pub opens: Arc<AtomicUsize>,
    pub close_calls: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
    // opened minus closed
    pub open_handles: Arc<AtomicUsize>,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

/// How a [`CountingSource`] ends.
#[derive(Clone, Copy, Debug)]
pub enum Ending {
    Endless,
    EndOfStream(usize),
    ReadError(usize),
    /// `read_next` panics after this many frames.
    Panic(usize),
}

/// Yields solid frames whose red channel is the frame index.
pub struct CountingSource {
    descriptor: SourceDescriptor,
    counters: Counters,
    ending: Ending,
    read_delay: Option<Duration>,
    produced: usize,
    closed: bool,
}

impl FrameSource for CountingSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        if self.closed {
            return Err(VideoError::Read("closed".to_string()));
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        match self.ending {
            Ending::EndOfStream(n) if self.produced >= n => return Err(VideoError::EndOfStream),
            Ending::ReadError(n) if self.produced >= n => {
                return Err(VideoError::Read("device unplugged".to_string()));
            }
            Ending::Panic(n) if self.produced >= n => panic!("source exploded after {n} frames"),
            _ => {}
        }
        let index = self.produced as u8;
        self.produced += 1;
        Ok(Frame::filled(64, 48, [index, 0, 0]))
    }

    fn close(&mut self) {
        self.counters.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed {
            self.closed = true;
            self.counters.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Opens [`CountingSource`]s, or fails every open when `fail` is set.
pub struct CountingOpener {
    pub counters: Counters,
    ending: Ending,
    read_delay: Option<Duration>,
    fail: bool,
}

impl CountingOpener {
    pub fn new(ending: Ending) -> Self {
        Self {
            counters: Counters::default(),
            ending,
            read_delay: None,
            fail: false,
        }
    }

    /// Every read blocks for `delay` before returning.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Ending::Endless)
        }
    }
}

impl SourceOpener for CountingOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, VideoError> {
        if self.fail {
            return Err(VideoError::Unavailable(format!("cannot open {descriptor}")));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.counters.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSource {
            descriptor: descriptor.clone(),
            counters: self.counters.clone(),
            ending: self.ending,
            read_delay: self.read_delay,
            produced: 0,
            closed: false,
        }))
    }
}

/// Encodes a frame as its red value at (0, 0), so tests can check frame order.
pub struct MarkerEncoder;

impl FrameEncoder for MarkerEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError> {
        Ok(vec![frame.pixel(0, 0).map(|p| p[0]).unwrap_or(0)])
    }
}

/// Fails on every frame whose marker is in `bad`.
pub struct FlakyEncoder {
    pub bad: Vec<u8>,
}

impl FrameEncoder for FlakyEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError> {
        let marker = frame.pixel(0, 0).map(|p| p[0]).unwrap_or(0);
        if self.bad.contains(&marker) {
            return Err(ImageError::Encode(format!("frame {marker} rejected")));
        }
        Ok(vec![marker])
    }
}

pub fn stub_descriptor() -> SourceDescriptor {
    SourceDescriptor::Synthetic(SyntheticSpec {
        width: 64,
        height: 48,
        frames: None,
    })
}
