use crate::yolo::{self, DEFAULT_INPUT_SIZE, DEFAULT_IOU_THRESHOLD};
use crate::{DetectError, Detection, Detector};
use ndarray::Array4;
use ort::{inputs, session::Session as OrtSession, value::TensorRef};
use posture_image::Frame;
use std::path::Path;
use std::sync::Mutex;

/// YOLO detector running an exported `.onnx` model on the CPU through ONNX Runtime.
pub struct OnnxDetector {
    session: Mutex<OrtSession>,
    input_name: String,
    output_name: String,
    input_size: u32,
    iou_threshold: f32,
    class_names: Vec<String>,
}

impl OnnxDetector {
    /// Load the model at `path`. Any failure is reported as `DetectError::NotReady`.
    pub fn load(path: impl AsRef<Path>, class_names: Vec<String>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DetectError::NotReady(format!(
                "model file not found at {}",
                path.display()
            )));
        }

        let session = OrtSession::builder()
            .map_err(|e| DetectError::NotReady(format!("failed to create session builder: {e}")))?
            .commit_from_file(path)
            .map_err(|e| DetectError::NotReady(format!("failed to load {}: {e}", path.display())))?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| DetectError::NotReady("model has no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| DetectError::NotReady("model has no outputs".to_string()))?;

        log::info!(
            "loaded {} (input {input_name:?}, output {output_name:?}, {} class names)",
            path.display(),
            class_names.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            class_names,
        })
    }

    /// Side of the square model input in pixels.
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    pub fn with_iou_threshold(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    fn infer(&self, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>), DetectError> {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());

        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectError::Inference(format!("failed to create tensor ref: {e}")))?;
        let outputs = session
            .run(inputs![self.input_name.as_str() => tensor])
            .map_err(|e| DetectError::Inference(format!("inference failed: {e}")))?;

        let array = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::Inference(format!("output {:?} is not f32: {e}", self.output_name)))?;

        Ok((array.shape().to_vec(), array.iter().copied().collect()))
    }
}

impl Detector for OnnxDetector {
    fn name(&self) -> &str {
        "onnx"
    }

    fn process(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>, DetectError> {
        let size = self.input_size as usize;
        let (data, info) = yolo::letterbox(frame, self.input_size)?;
        let input = Array4::from_shape_vec((1, 3, size, size), data)
            .map_err(|e| DetectError::Inference(format!("bad input shape: {e}")))?;

        let (shape, output) = self.infer(input)?;
        let candidates = yolo::decode_output(&shape, &output, confidence_threshold, &info, &self.class_names)?;
        Ok(yolo::non_max_suppression(candidates, self.iou_threshold))
    }
}
