use crate::{FrameSource, SourceDescriptor, VideoError};
use posture_image::{Frame, decode_image};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const READ_CHUNK: usize = 64 * 1024;

fn find_marker(data: &[u8], marker: [u8; 2]) -> Option<usize> {
    data.windows(2).position(|w| w == marker)
}

/// Default cap on the bytes of one image held while waiting for its end marker.
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Incrementally splits a Motion-JPEG byte stream into individual JPEG images.
///
/// Bytes before a start-of-image marker are discarded. An image ends at the
/// first end-of-image marker after its start, so JPEGs carrying an embedded
/// thumbnail are not supported.
#[derive(Debug)]
pub struct MjpegSplitter {
    buffer: Vec<u8>,
    max_image_bytes: usize,
}

impl Default for MjpegSplitter {
    fn default() -> Self {
        Self::with_limit(MAX_IMAGE_BYTES)
    }
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A splitter that gives up on an image once `max_image_bytes` are
    /// buffered without its end marker.
    pub fn with_limit(max_image_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_image_bytes,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete image, if one is buffered.
    ///
    /// Fails with `VideoError::Read` when an image outgrows the limit; the
    /// partial image is dropped and splitting can continue with new bytes.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, VideoError> {
        let start = match find_marker(&self.buffer, SOI) {
            Some(start) => start,
            None => {
                // keep a trailing 0xFF, it may begin a marker split across chunks
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                self.buffer.drain(..self.buffer.len() - keep);
                return Ok(None);
            }
        };
        if start > 0 {
            self.buffer.drain(..start);
        }

        let Some(end) = find_marker(&self.buffer[2..], EOI) else {
            if self.buffer.len() > self.max_image_bytes {
                let held = self.buffer.len();
                self.buffer.clear();
                return Err(VideoError::Read(format!(
                    "no end-of-image marker within {} bytes, dropped {held} buffered bytes",
                    self.max_image_bytes
                )));
            }
            return Ok(None);
        };
        let frame: Vec<u8> = self.buffer.drain(..end + 4).collect();
        Ok(Some(frame))
    }

    /// Bytes held back waiting for the rest of an image.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Split a complete Motion-JPEG buffer into its images, in order.
pub fn split_mjpeg(data: &[u8]) -> Vec<Vec<u8>> {
    let mut splitter = MjpegSplitter::new();
    splitter.push(data);
    std::iter::from_fn(|| match splitter.next_frame() {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("motion-jpeg split stopped: {e}");
            None
        }
    })
    .collect()
}

/// A `.mjpeg` / `.mjpg` file of concatenated JPEG images, read in chunks.
pub struct MjpegFileSource {
    descriptor: SourceDescriptor,
    file: Option<File>,
    splitter: MjpegSplitter,
}

impl MjpegFileSource {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let file = File::open(path)
            .map_err(|e| VideoError::Unavailable(format!("{}: {e}", path.display())))?;

        log::debug!("opened motion-jpeg file {}", path.display());
        Ok(Self {
            descriptor: SourceDescriptor::File(path.to_path_buf()),
            file: Some(file),
            splitter: MjpegSplitter::new(),
        })
    }
}

impl FrameSource for MjpegFileSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| VideoError::Read("source closed".to_string()))?;

        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(jpeg) = self.splitter.next_frame()? {
                return Ok(decode_image(&jpeg)?);
            }
            let n = file
                .read(&mut chunk)
                .map_err(|e| VideoError::Read(e.to_string()))?;
            if n == 0 {
                if self.splitter.buffered() > 0 {
                    log::debug!("discarding {} trailing bytes of a truncated image", self.splitter.buffered());
                }
                return Err(VideoError::EndOfStream);
            }
            self.splitter.push(&chunk[..n]);
        }
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Drop for MjpegFileSource {
    fn drop(&mut self) {
        self.close();
    }
}
