use crate::{DetectError, Detection};
use posture_image::Frame;

/// Runs object detection on a single frame.
///
/// Implementations are shared across tasks and must not need `&mut self`;
/// `process` may block for the duration of inference.
pub trait Detector: Send + Sync {
    /// Short backend name used in logs and the health endpoint.
    fn name(&self) -> &str;

    /// Detections scoring above `confidence_threshold`, ordered by confidence, highest first.
    fn process(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>, DetectError>;
}

/// Stands in for a detector whose model failed to load.
pub struct NotReadyDetector {
    reason: String,
}

impl NotReadyDetector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Detector for NotReadyDetector {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn process(&self, _frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>, DetectError> {
        Err(DetectError::NotReady(self.reason.clone()))
    }
}
