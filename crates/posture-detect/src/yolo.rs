//! YOLO pre- and post-processing, independent of the inference runtime.
//!
//! Input: letterboxed square RGB, NCHW, values in [0, 1].
//! Output: `[1, 4 + classes, N]`, each column `cx, cy, w, h, score_0 .. score_k`
//! in model-input pixels.

use crate::{BBox, DetectError, Detection};
use posture_image::Frame;

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// How a frame was scaled and padded into the model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    /// Size of the original frame.
    pub width: u32,
    pub height: u32,
}

impl LetterboxInfo {
    /// Map a model-space box back onto the original frame, clipped to its bounds.
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> BBox {
        let x = (cx - self.pad_x) / self.scale;
        let y = (cy - self.pad_y) / self.scale;
        let (hw, hh) = (w / self.scale / 2.0, h / self.scale / 2.0);
        let (max_x, max_y) = (self.width as f32, self.height as f32);
        BBox::new(
            (x - hw).clamp(0.0, max_x),
            (y - hh).clamp(0.0, max_y),
            (x + hw).clamp(0.0, max_x),
            (y + hh).clamp(0.0, max_y),
        )
    }
}

/// Scale `frame` to fit a `size` x `size` square, keeping aspect ratio, and
/// pad the remainder with gray. Returns NCHW data of length `3 * size * size`.
pub fn letterbox(frame: &Frame, size: u32) -> Result<(Vec<f32>, LetterboxInfo), DetectError> {
    let (w, h) = (frame.width(), frame.height());
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = frame.resized(new_w, new_h)?;
    let src = resized.data();
    let plane = (size * size) as usize;
    let mut data = vec![PAD_VALUE; 3 * plane];

    for y in 0..new_h as usize {
        let dst_row = (y + pad_y as usize) * size as usize + pad_x as usize;
        for x in 0..new_w as usize {
            let src_idx = (y * new_w as usize + x) * 3;
            for ch in 0..3 {
                data[ch * plane + dst_row + x] = src[src_idx + ch] as f32 / 255.0;
            }
        }
    }

    Ok((
        data,
        LetterboxInfo {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            width: w,
            height: h,
        },
    ))
}

/// Name for class `id`, falling back to `class_{id}` when no name is configured.
pub fn class_name(id: usize, names: &[String]) -> String {
    names.get(id).cloned().unwrap_or_else(|| format!("class_{id}"))
}

/// Decode raw `[1, 4 + classes, N]` output into detections scoring above
/// `threshold`. Boxes that collapse after clipping are dropped.
pub fn decode_output(
    shape: &[usize],
    data: &[f32],
    threshold: f32,
    info: &LetterboxInfo,
    names: &[String],
) -> Result<Vec<Detection>, DetectError> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        return Err(DetectError::Inference(format!(
            "expected output shape [1, 4 + classes, N], got {shape:?}"
        )));
    }
    let (rows, n) = (shape[1], shape[2]);
    if data.len() != rows * n {
        return Err(DetectError::Inference(format!(
            "output has {} values, shape {shape:?} needs {}",
            data.len(),
            rows * n
        )));
    }

    let mut detections = Vec::new();
    for i in 0..n {
        let (class_id, score) = (4..rows)
            .map(|row| (row - 4, data[row * n + i]))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));
        if score <= threshold {
            continue;
        }

        let bbox = info.unmap(data[i], data[n + i], data[2 * n + i], data[3 * n + i]);
        match Detection::new(class_name(class_id, names), score.min(1.0), bbox) {
            Ok(detection) => detections.push(detection),
            Err(e) => log::trace!("dropping candidate {i}: {e}"),
        }
    }
    Ok(detections)
}

/// Greedy per-class non-maximum suppression. Output is sorted by confidence, highest first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_name() == candidate.class_name() && kept.bbox().iou(&candidate.bbox()) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}
