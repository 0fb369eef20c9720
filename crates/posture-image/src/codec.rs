use crate::{Frame, ImageError, PixelLayout};
use crates_image::{DynamicImage, ExtendedColorType, ImageEncoder};

/// Decode an encoded image (format auto-detected) into a frame.
///
/// 8-bit gray, RGB and RGBA images keep their layout; everything else
/// (16-bit, float, gray+alpha) is converted to RGB.
pub fn decode_image(data: &[u8]) -> Result<Frame, ImageError> {
    let img = crates_image::load_from_memory(data)?;

    match img {
        DynamicImage::ImageLuma8(buf) => {
            let (w, h) = buf.dimensions();
            Frame::new(w, h, PixelLayout::Luma8, buf.into_raw())
        }
        DynamicImage::ImageRgb8(buf) => {
            let (w, h) = buf.dimensions();
            Frame::new(w, h, PixelLayout::Rgb8, buf.into_raw())
        }
        DynamicImage::ImageRgba8(buf) => {
            let (w, h) = buf.dimensions();
            Frame::new(w, h, PixelLayout::Rgba8, buf.into_raw())
        }
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            Frame::new(w, h, PixelLayout::Rgb8, rgb.into_raw())
        }
    }
}

/// Turns a frame into transport-ready bytes.
pub trait FrameEncoder: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError>;

    /// MIME type of the produced bytes.
    fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Baseline JPEG encoder.
#[derive(Clone, Copy, Debug)]
pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    /// `quality` is clamped into 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError> {
        let (color_type, stripped);
        let pixels: &[u8] = match frame.layout() {
            PixelLayout::Luma8 => {
                color_type = ExtendedColorType::L8;
                frame.data()
            }
            PixelLayout::Rgb8 => {
                color_type = ExtendedColorType::Rgb8;
                frame.data()
            }
            PixelLayout::Rgba8 => {
                // JPEG has no alpha channel
                color_type = ExtendedColorType::Rgb8;
                stripped = frame.to_rgb().into_data();
                &stripped
            }
        };

        let mut buffer = Vec::new();
        crates_image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .write_image(pixels, frame.width(), frame.height(), color_type)
            .map_err(|e| ImageError::Encode(e.to_string()))?;

        Ok(buffer)
    }
}
