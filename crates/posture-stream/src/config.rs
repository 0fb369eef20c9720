use std::time::Duration;

/// Settings for the stream pump.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamConfig {
    frame_interval: Duration,
    idle_interval: Duration,
    confidence_threshold: f32,
    resize: Option<(u32, u32)>,
    jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(30),
            idle_interval: Duration::from_secs(1),
            confidence_threshold: 0.5,
            resize: Some((640, 480)),
            jpeg_quality: 80,
        }
    }
}

impl StreamConfig {
    /// Minimum pause between two pushed frames.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Pause between "stream inactive" polls while no session is active.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Resolution every frame is scaled to before annotation; `None` keeps the source size.
    pub fn with_resize(mut self, resize: Option<(u32, u32)>) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    // Getters
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn idle_interval(&self) -> Duration {
        self.idle_interval
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn resize(&self) -> Option<(u32, u32)> {
        self.resize
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}
