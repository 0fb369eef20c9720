use crate::{DetectError, Detection, Detector};
use posture_image::Frame;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns a fixed list of detections for every frame.
#[derive(Debug, Default)]
pub struct StubDetector {
    detections: Vec<Detection>,
    calls: AtomicUsize,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            calls: AtomicUsize::new(0),
        }
    }

    /// A detector that never finds anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of frames processed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn process(&self, _frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>, DetectError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut kept: Vec<Detection> = self
            .detections
            .iter()
            .filter(|d| d.confidence() > confidence_threshold)
            .cloned()
            .collect();
        kept.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        Ok(kept)
    }
}
