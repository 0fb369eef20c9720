use crate::{
    ImageSequenceSource, MjpegFileSource, SourceDescriptor, StillImageSource, SyntheticSource,
    VideoError,
};
use crate::descriptor::MAX_SYNTHETIC_SIDE;
use posture_image::Frame;
use std::path::Path;

/// An open capture handle yielding raw frames.
///
/// `read_next` returns `VideoError::EndOfStream` once the source is exhausted
/// and `VideoError::Read` on mid-stream failures; neither is retried.
/// `close` releases the handle and may be called any number of times.
/// Implementations also close on drop.
pub trait FrameSource: Send {
    fn descriptor(&self) -> &SourceDescriptor;

    fn read_next(&mut self) -> Result<Frame, VideoError>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens frame sources. The stream controller goes through this seam so
/// tests can count or fail opens.
pub trait SourceOpener: Send + Sync {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, VideoError>;
}

/// Opens the built-in source for each descriptor kind.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultOpener;

impl SourceOpener for DefaultOpener {
    fn open(&self, descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, VideoError> {
        open_source(descriptor)
    }
}

const STILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];
const MJPEG_EXTENSIONS: &[&str] = &["mjpeg", "mjpg"];

pub(crate) fn has_extension(path: &Path, candidates: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| candidates.iter().any(|c| e.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

pub(crate) fn is_still_image(path: &Path) -> bool {
    has_extension(path, STILL_EXTENSIONS)
}

/// Open the source `descriptor` names.
///
/// Fails with `VideoError::Unavailable` when the device or file cannot be
/// opened; nothing is left half-open on failure.
pub fn open_source(descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, VideoError> {
    match descriptor {
        SourceDescriptor::Device(index) => open_device(*index),
        SourceDescriptor::Synthetic(spec) => {
            if spec.width > MAX_SYNTHETIC_SIDE || spec.height > MAX_SYNTHETIC_SIDE {
                return Err(VideoError::Unavailable(format!(
                    "{descriptor} exceeds {MAX_SYNTHETIC_SIDE} pixels per side"
                )));
            }
            Ok(Box::new(SyntheticSource::new(*spec)))
        }
        SourceDescriptor::File(path) => {
            if !path.exists() {
                return Err(VideoError::Unavailable(format!(
                    "no such file or directory: {}",
                    path.display()
                )));
            }
            if path.is_dir() {
                Ok(Box::new(ImageSequenceSource::open(path)?))
            } else if has_extension(path, MJPEG_EXTENSIONS) {
                Ok(Box::new(MjpegFileSource::open(path)?))
            } else if is_still_image(path) {
                Ok(Box::new(StillImageSource::open(path)?))
            } else {
                Err(VideoError::Unavailable(format!(
                    "unsupported container: {}",
                    path.display()
                )))
            }
        }
    }
}

#[cfg(feature = "v4l2")]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>, VideoError> {
    Ok(Box::new(crate::V4l2Source::open(index, Default::default())?))
}

#[cfg(not(feature = "v4l2"))]
fn open_device(index: u32) -> Result<Box<dyn FrameSource>, VideoError> {
    Err(VideoError::Unavailable(format!(
        "device:{index} requested but camera support (feature \"v4l2\") is not compiled in"
    )))
}
