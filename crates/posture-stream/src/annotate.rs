use crate::StreamError;
use posture_detect::{Detection, Detector};
use posture_image::{BLUE, Frame, FrameEncoder, GREEN, Rect, draw_rect, draw_text};
use std::sync::Arc;

const BOX_THICKNESS: u32 = 2;
const LABEL_SCALE: u32 = 2;
const LABEL_OFFSET: i32 = 10;
const LABEL_MIN_Y: i32 = 20;

/// One drawn detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlay {
    pub rect: Rect,
    pub label: String,
    /// Baseline-left point of the label text.
    pub label_origin: (i32, i32),
}

impl Overlay {
    pub fn for_detection(detection: &Detection) -> Self {
        let rect = detection.bbox().to_rect();
        Self {
            rect,
            label: detection.label(),
            label_origin: label_origin(&rect),
        }
    }
}

/// Label baseline for a box: 10 px above its top edge, never above y = 20.
pub fn label_origin(rect: &Rect) -> (i32, i32) {
    (rect.x1, (rect.y1 - LABEL_OFFSET).max(LABEL_MIN_Y))
}

/// Encoded output of one annotation pass.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub encoded: Vec<u8>,
    pub detections: Vec<Detection>,
    pub overlays: Vec<Overlay>,
}

/// Detect, draw, encode.
///
/// The input frame is never modified; drawing happens on an RGB copy.
pub struct AnnotationStep {
    detector: Arc<dyn Detector>,
    encoder: Arc<dyn FrameEncoder>,
}

impl AnnotationStep {
    pub fn new(detector: Arc<dyn Detector>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self { detector, encoder }
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    pub fn content_type(&self) -> &'static str {
        self.encoder.content_type()
    }

    /// Run the detector only.
    pub fn detect(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>, StreamError> {
        Ok(self.detector.process(frame, confidence_threshold)?)
    }

    /// Draw `detections` onto a copy of `frame` and return it with the overlays drawn.
    pub fn draw(&self, frame: &Frame, detections: &[Detection]) -> (Frame, Vec<Overlay>) {
        let mut canvas = frame.to_rgb();
        let overlays: Vec<Overlay> = detections.iter().map(Overlay::for_detection).collect();
        for overlay in &overlays {
            draw_rect(&mut canvas, overlay.rect, GREEN, BOX_THICKNESS);
            draw_text(&mut canvas, overlay.label_origin, &overlay.label, BLUE, LABEL_SCALE);
        }
        (canvas, overlays)
    }

    pub fn annotate(&self, frame: &Frame, confidence_threshold: f32) -> Result<AnnotatedFrame, StreamError> {
        let detections = self.detect(frame, confidence_threshold)?;
        let (canvas, overlays) = self.draw(frame, &detections);
        let encoded = self.encoder.encode(&canvas)?;
        log::trace!(
            "annotated {}x{} frame: {} detections, {} bytes",
            frame.width(),
            frame.height(),
            detections.len(),
            encoded.len()
        );
        Ok(AnnotatedFrame {
            encoded,
            detections,
            overlays,
        })
    }
}
