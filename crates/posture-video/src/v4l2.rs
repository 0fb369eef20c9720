use crate::convert::yuyv_to_rgb;
use crate::{FrameSource, SourceDescriptor, VideoError};
use posture_image::{Frame, decode_image};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

type FrameResult = Result<Frame, VideoError>;

/// Capture settings requested from the device.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_count: u32,
    /// How long `read_next` waits for the driver before reporting a read failure.
    pub read_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            buffer_count: 4,
            read_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Mjpeg,
    Yuyv,
}

/// V4L2 camera. Frames are captured on a dedicated thread and handed over
/// through a bounded channel.
pub struct V4l2Source {
    descriptor: SourceDescriptor,
    config: CaptureConfig,
    receiver: Option<Receiver<FrameResult>>,
    stop: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl V4l2Source {
    /// Open `/dev/video{index}` and start capturing.
    ///
    /// MJPEG is preferred; YUYV is accepted as a fallback. Any other format
    /// the driver settles on makes the open fail.
    pub fn open(index: u32, config: CaptureConfig) -> Result<Self, VideoError> {
        let device = Device::new(index as usize)
            .map_err(|e| VideoError::Unavailable(format!("/dev/video{index}: {e}")))?;

        let encoding = Self::negotiate(&device, &config)?;
        let params = v4l::video::capture::Parameters::with_fps(config.fps);
        Capture::set_params(&device, &params)?;

        let (tx, rx) = sync_channel(config.buffer_count.max(1) as usize);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let (width, height, buffer_count) = (config.width, config.height, config.buffer_count);

        let handle = thread::Builder::new()
            .name(format!("v4l2-capture-{index}"))
            .spawn(move || {
                if let Err(e) = Self::capture_loop(device, encoding, width, height, buffer_count, &tx, &thread_stop) {
                    log::warn!("capture thread for /dev/video{index} failed: {e}");
                    let _ = tx.send(Err(e));
                }
            })
            .map_err(|e| VideoError::Unavailable(format!("cannot spawn capture thread: {e}")))?;

        log::info!("opened /dev/video{index} at {width}x{height} ({encoding:?})");
        Ok(Self {
            descriptor: SourceDescriptor::Device(index),
            config,
            receiver: Some(rx),
            stop,
            thread_handle: Some(handle),
        })
    }

    fn negotiate(device: &Device, config: &CaptureConfig) -> Result<Encoding, VideoError> {
        for (fourcc, encoding) in [(b"MJPG", Encoding::Mjpeg), (b"YUYV", Encoding::Yuyv)] {
            let requested = Format::new(config.width, config.height, FourCC::new(fourcc));
            let actual = Capture::set_format(device, &requested)?;
            if actual.fourcc == FourCC::new(fourcc) {
                if actual.width != config.width || actual.height != config.height {
                    return Err(VideoError::Unavailable(format!(
                        "device offers {}x{} instead of {}x{}",
                        actual.width, actual.height, config.width, config.height
                    )));
                }
                return Ok(encoding);
            }
        }
        Err(VideoError::Unavailable(
            "device supports neither MJPEG nor YUYV".to_string(),
        ))
    }

    fn capture_loop(
        device: Device,
        encoding: Encoding,
        width: u32,
        height: u32,
        buffer_count: u32,
        tx: &SyncSender<FrameResult>,
        stop: &AtomicBool,
    ) -> Result<(), VideoError> {
        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, buffer_count)
            .map_err(|e| VideoError::Read(e.to_string()))?;

        while !stop.load(Ordering::Acquire) {
            let (data, _meta) =
                CaptureStream::next(&mut stream).map_err(|e| VideoError::Read(e.to_string()))?;

            let frame = match encoding {
                Encoding::Mjpeg => decode_image(data),
                Encoding::Yuyv => yuyv_to_rgb(data, width, height),
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    // a corrupt frame from the driver is not fatal
                    log::debug!("dropping undecodable capture buffer: {e}");
                    continue;
                }
            };

            if tx.send(Ok(frame)).is_err() {
                break;
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl FrameSource for V4l2Source {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn read_next(&mut self) -> Result<Frame, VideoError> {
        let receiver = self
            .receiver
            .as_ref()
            .ok_or_else(|| VideoError::Read("source closed".to_string()))?;

        match receiver.recv_timeout(self.config.read_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(VideoError::Read(format!(
                "no frame within {:?}",
                self.config.read_timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(VideoError::Read("capture thread stopped".to_string()))
            }
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        // dropping the receiver unblocks a pending send in the capture thread
        drop(self.receiver.take());
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            log::debug!("released {}", self.descriptor);
        }
    }

    fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.close();
    }
}
