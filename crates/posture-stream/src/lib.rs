//! The live stream session: one frame source, one client, explicit start/stop.
//!
//! [`StreamController`] owns the session state and the open source.
//! [`StreamPump`] is the per-client loop that reads frames through the
//! controller, runs them through [`AnnotationStep`], and pushes the encoded
//! result to a [`posture_com::Transport`] at a capped rate.

pub mod annotate;
pub mod config;
pub mod controller;
pub mod error;
pub mod pump;

pub use annotate::{AnnotatedFrame, AnnotationStep, Overlay, label_origin};
pub use config::StreamConfig;
pub use controller::{ReadOutcome, SourceInfo, StartOutcome, StopOutcome, StreamController, StreamStatus};
pub use error::StreamError;
pub use pump::{INACTIVE_MESSAGE, PumpExit, STOPPED_MESSAGE, StreamPump};
