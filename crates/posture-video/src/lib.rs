//! Frame sources for the posture stream.
//!
//! A [`FrameSource`] owns one capture handle (camera, file, directory or a
//! synthetic generator) and yields raw frames until end of stream. Sources
//! are opened from a [`SourceDescriptor`] through a [`SourceOpener`].

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod file;
pub mod mjpeg;
pub mod source;
pub mod synthetic;

#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use descriptor::{MAX_SYNTHETIC_SIDE, SourceDescriptor, SyntheticSpec};
pub use error::VideoError;
pub use file::{ImageSequenceSource, StillImageSource};
pub use mjpeg::{MjpegFileSource, MjpegSplitter, split_mjpeg};
pub use source::{DefaultOpener, FrameSource, SourceOpener, open_source};
pub use synthetic::SyntheticSource;

#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;
