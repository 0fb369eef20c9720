use crate::upload::Upload;
use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{StatusCode, header};
use posture_image::{Frame, decode_image};
use posture_stream::{AnnotationStep, StartOutcome, StreamController, StreamError};
use posture_video::{SourceDescriptor, split_mjpeg};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest request body the batch endpoints accept.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

const MJPEG_CONTENT_TYPE: &str = "video/x-motion-jpeg";

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    source: Option<String>,
    frames: u64,
}

#[derive(Serialize)]
struct DetectionBody {
    detections: Vec<posture_detect::Detection>,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct StartQuery {
    source: Option<String>,
}

/// The HTTP control surface: stream start/stop/status and the batch
/// image and video endpoints.
#[derive(Clone)]
pub struct ControlApi {
    controller: Arc<StreamController>,
    annotator: Arc<AnnotationStep>,
    confidence_threshold: f32,
    // set when the model failed to load
    not_ready: Option<String>,
    body_limit: usize,
}

impl ControlApi {
    pub fn new(controller: Arc<StreamController>, annotator: Arc<AnnotationStep>, confidence_threshold: f32) -> Self {
        Self {
            controller,
            annotator,
            confidence_threshold,
            not_ready: None,
            body_limit: MAX_BODY_BYTES,
        }
    }

    /// Refuse stream starts with 503 and `reason`.
    pub fn with_not_ready(mut self, reason: Option<String>) -> Self {
        self.not_ready = reason;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn router(self) -> Router {
        let body_limit = self.body_limit;
        Router::new()
            .route("/", get(index))
            .route("/health", get(health))
            .route("/stream/status", get(stream_status))
            .route("/stream/start", post(stream_start))
            .route("/stream/stop", post(stream_stop))
            .route("/yolo/predict", post(predict))
            .route("/yolo/detect", post(detect))
            .route("/yolo/predict-video", post(predict_video))
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(middleware::from_fn(log_request))
            .with_state(self)
    }

    fn status(&self) -> StatusBody {
        let info = self.controller.current_source();
        StatusBody {
            status: self.controller.status().as_str(),
            source: info.as_ref().map(|i| i.descriptor.to_string()),
            frames: info.map(|i| i.frames_read).unwrap_or(0),
        }
    }

    fn start(&self, source: Option<&str>) -> Response {
        if let Some(reason) = &self.not_ready {
            return stream_error_response(&StreamError::DetectorNotReady(reason.clone()));
        }

        let result = match source {
            Some(text) => match SourceDescriptor::parse(text) {
                Ok(descriptor) => self.controller.start_with(&descriptor),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
            },
            None => self.controller.start(),
        };

        match result {
            Ok(outcome) => {
                if outcome == StartOutcome::AlreadyActive {
                    log::debug!("start requested while active");
                }
                Json(json!({ "status": outcome.as_str() })).into_response()
            }
            Err(e) => stream_error_response(&e),
        }
    }

    fn stop(&self) -> Response {
        let outcome = self.controller.stop();
        Json(json!({ "status": outcome.as_str() })).into_response()
    }

    fn predict(&self, upload: Upload) -> Response {
        let frame = match image_upload(&upload) {
            Ok(frame) => frame,
            Err(response) => return response,
        };
        match self.annotator.annotate(&frame, self.confidence_threshold) {
            Ok(annotated) => {
                log::info!(
                    "annotated {}x{} upload: {} detections",
                    frame.width(),
                    frame.height(),
                    annotated.detections.len()
                );
                binary_response(self.annotator.content_type(), annotated.encoded)
            }
            Err(e) => stream_error_response(&e),
        }
    }

    fn detect(&self, upload: Upload) -> Response {
        let frame = match image_upload(&upload) {
            Ok(frame) => frame,
            Err(response) => return response,
        };
        match self.annotator.detect(&frame, self.confidence_threshold) {
            Ok(detections) => Json(DetectionBody {
                detections,
                width: frame.width(),
                height: frame.height(),
            })
            .into_response(),
            Err(e) => stream_error_response(&e),
        }
    }

    fn predict_video(&self, upload: Upload) -> Response {
        if !upload.content_type.starts_with("video/") {
            return error_response(StatusCode::BAD_REQUEST, "File must be a video");
        }
        if upload.content_type != MJPEG_CONTENT_TYPE {
            return error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                &format!("{} is not supported, send {MJPEG_CONTENT_TYPE}", upload.content_type),
            );
        }

        let mut output = Vec::with_capacity(upload.data.len());
        let (mut annotated_frames, mut skipped) = (0usize, 0usize);
        for (index, jpeg) in split_mjpeg(&upload.data).into_iter().enumerate() {
            let frame = match decode_image(&jpeg) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("skipping video frame {index}: {e}");
                    skipped += 1;
                    continue;
                }
            };
            match self.annotator.annotate(&frame, self.confidence_threshold) {
                Ok(annotated) => {
                    output.extend_from_slice(&annotated.encoded);
                    annotated_frames += 1;
                }
                Err(e @ StreamError::DetectorNotReady(_)) => return stream_error_response(&e),
                Err(e) => {
                    log::warn!("skipping video frame {index}: {e}");
                    skipped += 1;
                }
            }
        }

        if annotated_frames == 0 {
            return error_response(StatusCode::BAD_REQUEST, "video contains no decodable frames");
        }
        log::info!("annotated {annotated_frames} video frames, skipped {skipped}");
        binary_response(MJPEG_CONTENT_TYPE, output)
    }
}

fn image_upload(upload: &Upload) -> Result<Frame, Response> {
    if !upload.content_type.starts_with("image/") {
        return Err(error_response(StatusCode::BAD_REQUEST, "File must be an image"));
    }
    decode_image(&upload.data).map_err(|e| error_response(StatusCode::BAD_REQUEST, &e.to_string()))
}

// detection, codecs and device opens block, keep them off the reactor
async fn blocking<F>(api: ControlApi, work: F) -> Response
where
    F: FnOnce(&ControlApi) -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(move || work(&api)).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("request handler failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        log::warn!("{method} {path} -> {status}");
    } else {
        log::debug!("{method} {path} -> {status}");
    }
    response
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Dog posture detection API. POST /yolo/predict with an image or \
                    /yolo/predict-video with a video; POST /stream/start then connect \
                    to the stream socket for live frames."
    }))
}

async fn health(State(api): State<ControlApi>) -> Json<serde_json::Value> {
    let mut body = json!({
        "status": "ok",
        "detector": api.annotator.detector_name(),
    });
    if let Some(reason) = &api.not_ready {
        body["reason"] = json!(reason);
    }
    Json(body)
}

async fn stream_status(State(api): State<ControlApi>) -> Json<StatusBody> {
    Json(api.status())
}

async fn stream_start(State(api): State<ControlApi>, Query(query): Query<StartQuery>) -> Response {
    let source = query.source.filter(|s| !s.trim().is_empty());
    blocking(api, move |api| api.start(source.as_deref())).await
}

async fn stream_stop(State(api): State<ControlApi>) -> Response {
    blocking(api, |api| api.stop()).await
}

async fn predict(State(api): State<ControlApi>, upload: Upload) -> Response {
    blocking(api, move |api| api.predict(upload)).await
}

async fn detect(State(api): State<ControlApi>, upload: Upload) -> Response {
    blocking(api, move |api| api.detect(upload)).await
}

async fn predict_video(State(api): State<ControlApi>, upload: Upload) -> Response {
    blocking(api, move |api| api.predict_video(upload)).await
}

async fn not_found(uri: http::Uri) -> Response {
    error_response(StatusCode::NOT_FOUND, &format!("no route for {}", uri.path()))
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn binary_response(content_type: &str, body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, content_type.to_string())], body).into_response()
}

/// Map a stream error onto the status code the control API reports it with.
pub fn stream_error_status(err: &StreamError) -> StatusCode {
    match err {
        StreamError::SourceUnavailable(_) | StreamError::DetectorNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        StreamError::EncodeFailure(_)
        | StreamError::Detection(_)
        | StreamError::ReadFailure(_)
        | StreamError::TransportClosed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn stream_error_response(err: &StreamError) -> Response {
    let status = stream_error_status(err);
    if status.is_server_error() {
        log::warn!("{err}");
    }
    error_response(status, &err.to_string())
}
