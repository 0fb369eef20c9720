//! Object detection for posture frames.
//!
//! The [`Detector`] trait is the only thing the stream needs; a detector is
//! built once at startup and shared as `Arc<dyn Detector>`.

pub mod detection;
pub mod detector;
pub mod error;
pub mod stub;
pub mod yolo;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use detection::{BBox, Detection};
pub use detector::{Detector, NotReadyDetector};
pub use error::DetectError;
pub use stub::StubDetector;

#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;
