use crate::ImageError;
use crates_image::{RgbImage, imageops};

/// Channel layout of a [`Frame`]. All layouts use one byte per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Luma8,
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Luma8 => 1,
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// A raw interleaved pixel buffer, row-major, `height * width * channels` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap `data` as a frame, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidFrame(format!(
                "zero-sized frame {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(ImageError::InvalidFrame(format!(
                "expected {expected} bytes for {width}x{height} {layout:?}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// An RGB frame with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let data = color.iter().copied().cycle().take(pixels * 3).collect();
        Self {
            width,
            height,
            layout: PixelLayout::Rgb8,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of the pixel at (x, y), or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let ch = self.channels();
        let offset = (y as usize * self.width as usize + x as usize) * ch;
        Some(&self.data[offset..offset + ch])
    }

    /// A new RGB copy of this frame. The source buffer is never shared.
    pub fn to_rgb(&self) -> Frame {
        let data = match self.layout {
            PixelLayout::Rgb8 => self.data.clone(),
            PixelLayout::Luma8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
            PixelLayout::Rgba8 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
        };
        Frame {
            width: self.width,
            height: self.height,
            layout: PixelLayout::Rgb8,
            data,
        }
    }

    /// An RGB copy scaled to `width` x `height` with a triangle filter.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::InvalidFrame(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        let rgb = self.to_rgb();
        if rgb.width == width && rgb.height == height {
            return Ok(rgb);
        }

        let buffer = RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .ok_or_else(|| ImageError::InvalidFrame("buffer does not match dimensions".to_string()))?;
        let scaled = imageops::resize(&buffer, width, height, imageops::FilterType::Triangle);

        Frame::new(width, height, PixelLayout::Rgb8, scaled.into_raw())
    }
}
