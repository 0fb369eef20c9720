//! Posture detection server: the axum control API, the websocket stream
//! listener and the glue that builds both from a [`ServerConfig`].

pub mod config;
pub mod routes;
pub mod upload;

pub use config::{ConfigError, ServerConfig};
pub use routes::{ControlApi, MAX_BODY_BYTES};

use posture_detect::Detector;
use std::sync::Arc;

/// The detector the server runs with, plus the reason it is unusable if the model failed to load.
#[cfg(feature = "onnx")]
pub fn build_detector(config: &ServerConfig) -> (Arc<dyn Detector>, Option<String>) {
    use posture_detect::{DetectError, NotReadyDetector, OnnxDetector};

    match OnnxDetector::load(&config.model_path, config.class_names.clone()) {
        Ok(detector) => (Arc::new(detector.with_input_size(config.input_size)), None),
        Err(e) => {
            log::error!("detector not ready: {e}");
            let reason = match e {
                DetectError::NotReady(msg) => msg,
                other => other.to_string(),
            };
            (Arc::new(NotReadyDetector::new(reason.clone())), Some(reason))
        }
    }
}

/// Reason reported by a server compiled without model support.
pub const NO_ONNX_REASON: &str = "built without onnx support";

#[cfg(not(feature = "onnx"))]
pub fn build_detector(config: &ServerConfig) -> (Arc<dyn Detector>, Option<String>) {
    use posture_detect::NotReadyDetector;

    log::error!(
        "detector not ready: {NO_ONNX_REASON}, {} is not loaded",
        config.model_path.display()
    );
    (
        Arc::new(NotReadyDetector::new(NO_ONNX_REASON)),
        Some(NO_ONNX_REASON.to_string()),
    )
}
