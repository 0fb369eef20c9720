use crate::font::{ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, glyph};
use crate::{Frame, PixelLayout};

/// RGB color.
pub type Color = [u8; 3];

pub const GREEN: Color = [0, 255, 0];
pub const BLUE: Color = [0, 0, 255];

/// Axis-aligned rectangle with inclusive pixel corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Set one pixel. Coordinates outside the frame are ignored.
pub fn put_pixel(frame: &mut Frame, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x >= frame.width() as i32 || y >= frame.height() as i32 {
        return;
    }
    let layout = frame.layout();
    let ch = layout.channels();
    let offset = (y as usize * frame.width() as usize + x as usize) * ch;
    let px = &mut frame.data_mut()[offset..offset + ch];
    match layout {
        PixelLayout::Luma8 => {
            px[0] = ((color[0] as u32 * 299 + color[1] as u32 * 587 + color[2] as u32 * 114) / 1000) as u8;
        }
        PixelLayout::Rgb8 => px.copy_from_slice(&color),
        PixelLayout::Rgba8 => {
            px[..3].copy_from_slice(&color);
            px[3] = 255;
        }
    }
}

/// Fill a `w` x `h` block whose top-left corner is (x, y), clipped to the frame.
pub fn fill_rect(frame: &mut Frame, x: i32, y: i32, w: u32, h: u32, color: Color) {
    for dy in 0..h as i32 {
        for dx in 0..w as i32 {
            put_pixel(frame, x + dx, y + dy, color);
        }
    }
}

/// Outline `rect`. Extra thickness grows inward from the corners.
pub fn draw_rect(frame: &mut Frame, rect: Rect, color: Color, thickness: u32) {
    let (x1, x2) = (rect.x1.min(rect.x2), rect.x1.max(rect.x2));
    let (y1, y2) = (rect.y1.min(rect.y2), rect.y1.max(rect.y2));

    for t in 0..thickness.max(1) as i32 {
        let (l, r, top, bottom) = (x1 + t, x2 - t, y1 + t, y2 - t);
        if l > r || top > bottom {
            break;
        }
        for x in l..=r {
            put_pixel(frame, x, top, color);
            put_pixel(frame, x, bottom, color);
        }
        for y in top..=bottom {
            put_pixel(frame, l, y, color);
            put_pixel(frame, r, y, color);
        }
    }
}

/// Width and height in pixels of `text` rendered at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let count = text.chars().count() as u32;
    if count == 0 {
        return (0, 0);
    }
    let width = (count - 1) * ADVANCE + GLYPH_WIDTH;
    (width * scale, GLYPH_HEIGHT * scale)
}

/// Render `text` with its bottom-left corner at `origin` and return the covered rect.
///
/// The origin is the text baseline, so glyph rows occupy
/// `origin.1 - 7 * scale .. origin.1`.
pub fn draw_text(frame: &mut Frame, origin: (i32, i32), text: &str, color: Color, scale: u32) -> Rect {
    let scale = scale.max(1);
    let s = scale as i32;
    let top = origin.1 - GLYPH_HEIGHT as i32 * s;

    for (i, c) in text.chars().enumerate() {
        let left = origin.0 + i as i32 * ADVANCE as i32 * s;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    fill_rect(frame, left + col as i32 * s, top + row as i32 * s, scale, scale, color);
                }
            }
        }
    }

    let (w, h) = text_size(text, scale);
    Rect::new(origin.0, origin.1 - h as i32, origin.0 + w as i32 - 1, origin.1 - 1)
}
