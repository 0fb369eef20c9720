//! Shared process plumbing for the posture workspace.

pub mod logging;

pub use log;
