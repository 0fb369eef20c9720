use posture_image::font::{ADVANCE, GLYPH_HEIGHT};
use posture_image::{
    BLUE, Frame, GREEN, PixelLayout, Rect, draw_rect, draw_text, fill_rect, put_pixel, text_size,
};

fn black(w: u32, h: u32) -> Frame {
    Frame::filled(w, h, [0, 0, 0])
}

#[test]
fn test_put_pixel_clips() {
    let mut frame = black(4, 4);
    put_pixel(&mut frame, -1, 0, GREEN);
    put_pixel(&mut frame, 4, 4, GREEN);
    assert!(frame.data().iter().all(|&b| b == 0));

    put_pixel(&mut frame, 3, 3, GREEN);
    assert_eq!(frame.pixel(3, 3), Some(&GREEN[..]));
}

#[test]
fn test_put_pixel_on_luma_and_rgba() {
    let mut gray = Frame::new(1, 1, PixelLayout::Luma8, vec![0]).unwrap();
    put_pixel(&mut gray, 0, 0, [255, 255, 255]);
    assert_eq!(gray.data(), &[255]);

    let mut rgba = Frame::new(1, 1, PixelLayout::Rgba8, vec![0; 4]).unwrap();
    put_pixel(&mut rgba, 0, 0, BLUE);
    assert_eq!(rgba.data(), &[0, 0, 255, 255]);
}

#[test]
fn test_draw_rect_outline_thickness_two() {
    let mut frame = black(60, 60);
    draw_rect(&mut frame, Rect::new(10, 10, 50, 50), GREEN, 2);

    for (x, y) in [(10, 10), (50, 10), (10, 50), (50, 50), (11, 30), (49, 30), (30, 11)] {
        assert_eq!(frame.pixel(x, y), Some(&GREEN[..]), "({x},{y}) should be drawn");
    }
    // interior and exterior untouched
    assert_eq!(frame.pixel(30, 30), Some(&[0u8, 0, 0][..]));
    assert_eq!(frame.pixel(12, 30), Some(&[0u8, 0, 0][..]));
    assert_eq!(frame.pixel(9, 9), Some(&[0u8, 0, 0][..]));
}

#[test]
fn test_draw_rect_partially_outside() {
    let mut frame = black(20, 20);
    draw_rect(&mut frame, Rect::new(-5, -5, 10, 10), GREEN, 1);
    assert_eq!(frame.pixel(10, 0), Some(&GREEN[..]));
    assert_eq!(frame.pixel(0, 10), Some(&GREEN[..]));
}

#[test]
fn test_fill_rect() {
    let mut frame = black(5, 5);
    fill_rect(&mut frame, 1, 1, 2, 2, BLUE);
    assert_eq!(frame.pixel(2, 2), Some(&BLUE[..]));
    assert_eq!(frame.pixel(3, 3), Some(&[0u8, 0, 0][..]));
}

#[test]
fn test_text_size() {
    assert_eq!(text_size("", 2), (0, 0));
    assert_eq!(text_size("a", 1), (5, GLYPH_HEIGHT));
    assert_eq!(text_size("sit 0.91", 2), ((7 * ADVANCE + 5) * 2, GLYPH_HEIGHT * 2));
}

#[test]
fn test_draw_text_sits_above_origin() {
    let mut frame = black(80, 40);
    let covered = draw_text(&mut frame, (10, 20), "T", BLUE, 2);

    assert_eq!(covered, Rect::new(10, 6, 19, 19));
    // top bar of the T spans the first glyph row
    assert_eq!(frame.pixel(10, 6), Some(&BLUE[..]));
    assert_eq!(frame.pixel(19, 7), Some(&BLUE[..]));
    // nothing drawn on or below the baseline
    for x in 0..80 {
        assert_eq!(frame.pixel(x, 20), Some(&[0u8, 0, 0][..]));
    }
}
