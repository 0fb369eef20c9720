use crate::VideoError;
use std::fmt;
use std::path::PathBuf;

/// Largest width or height a synthetic source may be asked for.
pub const MAX_SYNTHETIC_SIDE: u32 = 8192;

/// Parameters of a generated test pattern source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyntheticSpec {
    pub width: u32,
    pub height: u32,
    /// Number of frames before end of stream; unbounded when `None`.
    pub frames: Option<u64>,
}

/// Identifies what a frame source should capture from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// V4L2 device index, i.e. `/dev/video{N}`.
    Device(u32),
    File(PathBuf),
    Synthetic(SyntheticSpec),
}

impl SourceDescriptor {
    /// Parse `device:N`, a bare index `N`, `stub://WxH[?frames=K]`, or a filesystem path.
    pub fn parse(text: &str) -> Result<Self, VideoError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VideoError::InvalidDescriptor("empty descriptor".to_string()));
        }

        if let Some(index) = text.strip_prefix("device:") {
            return index
                .parse::<u32>()
                .map(SourceDescriptor::Device)
                .map_err(|_| VideoError::InvalidDescriptor(format!("bad device index in {text:?}")));
        }
        if let Ok(index) = text.parse::<u32>() {
            return Ok(SourceDescriptor::Device(index));
        }
        if let Some(rest) = text.strip_prefix("stub://") {
            return parse_synthetic(rest).map(SourceDescriptor::Synthetic);
        }

        Ok(SourceDescriptor::File(PathBuf::from(text)))
    }
}

fn parse_synthetic(rest: &str) -> Result<SyntheticSpec, VideoError> {
    let invalid = || VideoError::InvalidDescriptor(format!("expected stub://WxH[?frames=K], got stub://{rest}"));

    let (size, query) = match rest.split_once('?') {
        Some((size, query)) => (size, Some(query)),
        None => (rest, None),
    };
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    let width = w.parse::<u32>().map_err(|_| invalid())?;
    let height = h.parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    if width > MAX_SYNTHETIC_SIDE || height > MAX_SYNTHETIC_SIDE {
        return Err(VideoError::InvalidDescriptor(format!(
            "stub://{width}x{height} exceeds {MAX_SYNTHETIC_SIDE} pixels per side"
        )));
    }

    let mut frames = None;
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("frames", n)) => frames = Some(n.parse::<u64>().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            }
        }
    }

    Ok(SyntheticSpec {
        width,
        height,
        frames,
    })
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Device(index) => write!(f, "device:{index}"),
            SourceDescriptor::File(path) => write!(f, "{}", path.display()),
            SourceDescriptor::Synthetic(spec) => {
                write!(f, "stub://{}x{}", spec.width, spec.height)?;
                if let Some(frames) = spec.frames {
                    write!(f, "?frames={frames}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::str::FromStr for SourceDescriptor {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceDescriptor::parse(s)
    }
}
