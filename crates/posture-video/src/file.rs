use crate::source::is_still_image;
use crate::{FrameSource, SourceDescriptor, VideoError};
use posture_image::{Frame, decode_image};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// A single image file, delivered once and then end of stream.
pub struct StillImageSource {
    descriptor: SourceDescriptor,
    frame: Option<Frame>,
    closed: bool,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let bytes = std::fs::read(path)
            .map_err(|e| VideoError::Unavailable(format!("{}: {e}", path.display())))?;
        let frame = decode_image(&bytes)
            .map_err(|e| VideoError::Unavailable(format!("{}: {e}", path.display())))?;

        log::debug!("opened still image {} ({}x{})", path.display(), frame.width(), frame.height());
        Ok(Self {
            descriptor: SourceDescriptor::File(path.to_path_buf()),
            frame: Some(frame),
            closed: false,
        })
    }
}

impl FrameSource for StillImageSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        if self.closed {
            return Err(VideoError::Read("source closed".to_string()));
        }
        self.frame.take().ok_or(VideoError::EndOfStream)
    }

    fn close(&mut self) {
        self.frame = None;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for StillImageSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// A directory of image files played back in file-name order.
pub struct ImageSequenceSource {
    descriptor: SourceDescriptor,
    pending: VecDeque<PathBuf>,
    closed: bool,
}

impl ImageSequenceSource {
    /// Lists the directory once; files added later are not picked up.
    pub fn open(dir: &Path) -> Result<Self, VideoError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| VideoError::Unavailable(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_still_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(VideoError::Unavailable(format!(
                "no images in directory {}",
                dir.display()
            )));
        }

        log::debug!("opened image sequence {} ({} frames)", dir.display(), files.len());
        Ok(Self {
            descriptor: SourceDescriptor::File(dir.to_path_buf()),
            pending: files.into(),
            closed: false,
        })
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        if self.closed {
            return Err(VideoError::Read("source closed".to_string()));
        }
        let path = self.pending.pop_front().ok_or(VideoError::EndOfStream)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| VideoError::Read(format!("{}: {e}", path.display())))?;
        Ok(decode_image(&bytes)?)
    }

    fn close(&mut self) {
        self.pending.clear();
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ImageSequenceSource {
    fn drop(&mut self) {
        self.close();
    }
}
