use crate::DetectError;
use posture_image::Rect;
use serde::{Serialize, Serializer};

/// Bounding box in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union; 0.0 when either box is empty.
    pub fn iou(&self, other: &BBox) -> f32 {
        let (a, b) = (self.area(), other.area());
        if a <= 0.0 || b <= 0.0 {
            return 0.0;
        }
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = a + b - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Integer pixel rect, truncating each coordinate.
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32)
    }
}

// serialized as [x1, y1, x2, y2]
impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x1, self.y1, self.x2, self.y2].serialize(serializer)
    }
}

/// One detected object. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    class_name: String,
    confidence: f32,
    bbox: BBox,
}

impl Detection {
    /// Build a detection, rejecting non-finite or out-of-range confidence and
    /// boxes that are empty or inverted.
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BBox) -> Result<Self, DetectError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DetectError::InvalidDetection(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
        let coords = [bbox.x1, bbox.y1, bbox.x2, bbox.y2];
        if coords.iter().any(|c| !c.is_finite()) || bbox.x1 >= bbox.x2 || bbox.y1 >= bbox.y2 {
            return Err(DetectError::InvalidDetection(format!("degenerate box {bbox:?}")));
        }
        Ok(Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    /// Overlay text, e.g. `"sit 0.91"`.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class_name, self.confidence)
    }
}
