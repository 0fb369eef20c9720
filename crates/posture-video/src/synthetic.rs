use crate::descriptor::MAX_SYNTHETIC_SIDE;
use crate::{FrameSource, SourceDescriptor, SyntheticSpec, VideoError};
use posture_image::{Frame, PixelLayout};

/// Generates a moving RGB gradient; used for demos and for running the
/// server without a camera (`stub://640x480`).
pub struct SyntheticSource {
    descriptor: SourceDescriptor,
    spec: SyntheticSpec,
    produced: u64,
    closed: bool,
}

impl SyntheticSource {
    pub fn new(spec: SyntheticSpec) -> Self {
        Self {
            descriptor: SourceDescriptor::Synthetic(spec),
            spec,
            produced: 0,
            closed: false,
        }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Fails for sizes past [`MAX_SYNTHETIC_SIDE`], so a hand-built spec
    /// cannot ask for an unbounded allocation.
    fn render(&self, t: u64) -> Result<Vec<u8>, VideoError> {
        let (w, h) = (self.spec.width as u64, self.spec.height as u64);
        let len = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(3))
            .filter(|_| self.spec.width <= MAX_SYNTHETIC_SIDE && self.spec.height <= MAX_SYNTHETIC_SIDE)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                VideoError::Read(format!(
                    "synthetic frame {}x{} is too large",
                    self.spec.width, self.spec.height
                ))
            })?;
        let mut data = Vec::with_capacity(len);
        for y in 0..h {
            for x in 0..w {
                data.push(((x + t * 4) % 256) as u8);
                data.push((y * 255 / h.max(1)) as u8);
                data.push(((t * 8) % 256) as u8);
            }
        }
        Ok(data)
    }
}

impl FrameSource for SyntheticSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        if self.closed {
            return Err(VideoError::Read("source closed".to_string()));
        }
        if self.spec.frames.is_some_and(|limit| self.produced >= limit) {
            return Err(VideoError::EndOfStream);
        }

        let data = self.render(self.produced)?;
        self.produced += 1;
        Ok(Frame::new(self.spec.width, self.spec.height, PixelLayout::Rgb8, data)?)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
