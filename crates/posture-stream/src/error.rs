use posture_com::ComError;
use posture_detect::DetectError;
use posture_image::ImageError;
use posture_video::VideoError;
use std::fmt;

#[derive(Debug)]
pub enum StreamError {
    /// The capture device or file could not be opened.
    SourceUnavailable(String),
    /// The source failed or ended mid-stream; the session is over.
    ReadFailure(String),
    /// One frame could not be encoded; it is skipped.
    EncodeFailure(String),
    TransportClosed,
    DetectorNotReady(String),
    /// The detector failed on one frame; it is skipped.
    Detection(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::SourceUnavailable(msg) => write!(f, "source unavailable: {msg}"),
            StreamError::ReadFailure(msg) => write!(f, "read failure: {msg}"),
            StreamError::EncodeFailure(msg) => write!(f, "encode failure: {msg}"),
            StreamError::TransportClosed => write!(f, "transport closed"),
            StreamError::DetectorNotReady(msg) => write!(f, "detector not ready: {msg}"),
            StreamError::Detection(msg) => write!(f, "detection failed: {msg}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<VideoError> for StreamError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::Unavailable(_) | VideoError::InvalidDescriptor(_) => {
                StreamError::SourceUnavailable(err.to_string())
            }
            other => StreamError::ReadFailure(other.to_string()),
        }
    }
}

impl From<DetectError> for StreamError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::NotReady(msg) => StreamError::DetectorNotReady(msg),
            other => StreamError::Detection(other.to_string()),
        }
    }
}

impl From<ImageError> for StreamError {
    fn from(err: ImageError) -> Self {
        StreamError::EncodeFailure(err.to_string())
    }
}

impl From<ComError> for StreamError {
    fn from(_: ComError) -> Self {
        StreamError::TransportClosed
    }
}
