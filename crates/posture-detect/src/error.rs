use posture_image::ImageError;
use std::fmt;

#[derive(Debug)]
pub enum DetectError {
    /// The model is not loaded; detection cannot run at all.
    NotReady(String),
    InvalidDetection(String),
    Inference(String),
    Image(ImageError),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::NotReady(msg) => write!(f, "detector not ready: {msg}"),
            DetectError::InvalidDetection(msg) => write!(f, "invalid detection: {msg}"),
            DetectError::Inference(msg) => write!(f, "inference error: {msg}"),
            DetectError::Image(err) => write!(f, "image error: {err}"),
        }
    }
}

impl std::error::Error for DetectError {}

impl From<ImageError> for DetectError {
    fn from(err: ImageError) -> Self {
        DetectError::Image(err)
    }
}
