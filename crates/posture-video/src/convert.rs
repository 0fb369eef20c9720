use posture_image::{Frame, ImageError, PixelLayout};

fn clamp_u8(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Convert packed YUYV (YUV 4:2:2, `[Y0, U, Y1, V]` per pixel pair) into an RGB frame.
///
/// Uses BT.601 coefficients. `width` must be even; extra trailing bytes in
/// `data` are ignored.
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Frame, ImageError> {
    let pixels = width as usize * height as usize;
    if width % 2 != 0 {
        return Err(ImageError::InvalidFrame(format!("YUYV width {width} is odd")));
    }
    if data.len() < pixels * 2 {
        return Err(ImageError::InvalidFrame(format!(
            "YUYV {width}x{height} needs {} bytes, got {}",
            pixels * 2,
            data.len()
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for quad in data[..pixels * 2].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for y in [quad[0] as f32, quad[2] as f32] {
            rgb.push(clamp_u8(y + 1.402 * v));
            rgb.push(clamp_u8(y - 0.344 * u - 0.714 * v));
            rgb.push(clamp_u8(y + 1.772 * u));
        }
    }

    Frame::new(width, height, PixelLayout::Rgb8, rgb)
}
