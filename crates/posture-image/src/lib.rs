//! Pixel buffers, codecs and drawing for annotated frames.
//!
//! Frames are stored interleaved (HWC) with 8 bits per channel. Decoding and
//! encoding go through the `image` crate; drawing works directly on the buffer.

pub mod codec;
pub mod draw;
pub mod error;
pub mod font;
pub mod frame;

pub use codec::{FrameEncoder, JpegEncoder, decode_image};
pub use draw::{BLUE, Color, GREEN, Rect, draw_rect, draw_text, fill_rect, put_pixel, text_size};
pub use error::ImageError;
pub use frame::{Frame, PixelLayout};
