use posture_image::ImageError;
use std::fmt;

#[derive(Debug)]
pub enum VideoError {
    /// The source could not be opened (missing file, busy device, unsupported format).
    Unavailable(String),
    InvalidDescriptor(String),
    EndOfStream,
    Read(String),
    Decode(ImageError),
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
            VideoError::InvalidDescriptor(msg) => write!(f, "invalid source descriptor: {msg}"),
            VideoError::EndOfStream => write!(f, "end of stream"),
            VideoError::Read(msg) => write!(f, "read error: {msg}"),
            VideoError::Decode(err) => write!(f, "frame decode error: {err}"),
        }
    }
}

impl std::error::Error for VideoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VideoError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ImageError> for VideoError {
    fn from(err: ImageError) -> Self {
        VideoError::Decode(err)
    }
}

#[cfg(feature = "v4l2")]
impl From<std::io::Error> for VideoError {
    fn from(err: std::io::Error) -> Self {
        VideoError::Unavailable(err.to_string())
    }
}
