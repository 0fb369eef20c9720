use posture_base::log::LevelFilter;
use posture_base::logging::{default_level, parse_level};
use posture_stream::StreamConfig;
use posture_video::SourceDescriptor;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONTROL_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STREAM_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_SOURCE: &str = "device:0";
const DEFAULT_MODEL_PATH: &str = "models/final_model_yolo11.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Env var naming the config file when none is given on the command line.
pub const CONFIG_ENV: &str = "POSTURE_CONFIG";

#[derive(Debug)]
pub enum ConfigError {
    Read(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "cannot read config: {msg}"),
            ConfigError::Parse(msg) => write!(f, "invalid config file: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerConfigFile {
    control_addr: Option<String>,
    stream_addr: Option<String>,
    source: Option<String>,
    model_path: Option<PathBuf>,
    class_names: Option<Vec<String>>,
    input_size: Option<u32>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    stream: Option<StreamConfigFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StreamConfigFile {
    frame_interval_ms: Option<u64>,
    idle_interval_ms: Option<u64>,
    confidence_threshold: Option<f32>,
    /// `[width, height]`, or `null` to keep the source resolution.
    #[serde(default, deserialize_with = "deserialize_resize")]
    resize: Option<Option<[u32; 2]>>,
    jpeg_quality: Option<u8>,
}

// distinguishes a missing key from an explicit null
fn deserialize_resize<'de, D>(deserializer: D) -> Result<Option<Option<[u32; 2]>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<[u32; 2]>::deserialize(deserializer).map(Some)
}

/// Everything the server binary needs, after defaults, file and env are merged.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub control_addr: SocketAddr,
    pub stream_addr: SocketAddr,
    pub source: SourceDescriptor,
    pub model_path: PathBuf,
    pub class_names: Vec<String>,
    pub input_size: u32,
    /// Log to daily files in this directory instead of stdout.
    pub log_dir: Option<PathBuf>,
    pub log_level: LevelFilter,
    pub stream: StreamConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            control_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            stream_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            source: SourceDescriptor::Device(0),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            class_names: Vec::new(),
            input_size: DEFAULT_INPUT_SIZE,
            log_dir: None,
            log_level: default_level(),
            stream: StreamConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the file named by `config_path` (or `POSTURE_CONFIG`), then
    /// apply `POSTURE_*` env overrides and validate.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path.or_else(|| env(CONFIG_ENV).filter(|p| !p.trim().is_empty()).map(PathBuf::from));
        Self::load_with(path.as_deref(), env)
    }

    /// [`ServerConfig::load`] with an explicit env lookup.
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_config_file(path)?,
            None => ServerConfigFile::default(),
        };
        let mut config = Self::from_file(file)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config document over the defaults. No env, no validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: ServerConfigFile = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: ServerConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut stream = defaults.stream.clone();
        if let Some(s) = file.stream {
            if let Some(ms) = s.frame_interval_ms {
                stream = stream.with_frame_interval(Duration::from_millis(ms));
            }
            if let Some(ms) = s.idle_interval_ms {
                stream = stream.with_idle_interval(Duration::from_millis(ms));
            }
            if let Some(threshold) = s.confidence_threshold {
                stream = stream.with_confidence_threshold(threshold);
            }
            if let Some(resize) = s.resize {
                stream = stream.with_resize(resize.map(|[w, h]| (w, h)));
            }
            if let Some(quality) = s.jpeg_quality {
                stream = stream.with_jpeg_quality(quality);
            }
        }

        Ok(Self {
            control_addr: parse_addr("control_addr", file.control_addr.as_deref().unwrap_or(DEFAULT_CONTROL_ADDR))?,
            stream_addr: parse_addr("stream_addr", file.stream_addr.as_deref().unwrap_or(DEFAULT_STREAM_ADDR))?,
            source: parse_source(file.source.as_deref().unwrap_or(DEFAULT_SOURCE))?,
            model_path: file.model_path.unwrap_or(defaults.model_path),
            class_names: file.class_names.unwrap_or_default(),
            input_size: file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            log_dir: file.log_dir,
            log_level: match file.log_level {
                Some(name) => parse_log_level(&name)?,
                None => defaults.log_level,
            },
            stream,
        })
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = var("POSTURE_CONTROL_ADDR") {
            self.control_addr = parse_addr("POSTURE_CONTROL_ADDR", &addr)?;
        }
        if let Some(addr) = var("POSTURE_STREAM_ADDR") {
            self.stream_addr = parse_addr("POSTURE_STREAM_ADDR", &addr)?;
        }
        if let Some(source) = var("POSTURE_SOURCE") {
            self.source = parse_source(&source)?;
        }
        if let Some(path) = var("POSTURE_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(names) = var("POSTURE_CLASS_NAMES") {
            self.class_names = split_csv(&names);
        }
        if let Some(ms) = var("POSTURE_FRAME_INTERVAL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                ConfigError::Invalid("POSTURE_FRAME_INTERVAL_MS must be an integer number of milliseconds".to_string())
            })?;
            self.stream = self.stream.clone().with_frame_interval(Duration::from_millis(ms));
        }
        if let Some(confidence) = var("POSTURE_CONFIDENCE") {
            let confidence: f32 = confidence
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("POSTURE_CONFIDENCE must be a number".to_string()))?;
            self.stream = self.stream.clone().with_confidence_threshold(confidence);
        }
        if let Some(dir) = var("POSTURE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = var("POSTURE_LOG_LEVEL") {
            self.log_level = parse_log_level(&level)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.stream.confidence_threshold();
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence threshold {threshold} outside [0, 1]"
            )));
        }
        if self.stream.frame_interval().is_zero() {
            return Err(ConfigError::Invalid("frame interval must be greater than zero".to_string()));
        }
        if self.stream.idle_interval().is_zero() {
            return Err(ConfigError::Invalid("idle interval must be greater than zero".to_string()));
        }
        if let Some((w, h)) = self.stream.resize() {
            if w == 0 || h == 0 {
                return Err(ConfigError::Invalid(format!("resize {w}x{h} has a zero side")));
            }
        }
        if !(1..=100).contains(&self.stream.jpeg_quality()) {
            return Err(ConfigError::Invalid(format!(
                "jpeg quality {} outside 1..=100",
                self.stream.jpeg_quality()
            )));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(ConfigError::Invalid(format!(
                "input size {} must be a positive multiple of 32",
                self.input_size
            )));
        }
        if self.control_addr == self.stream_addr {
            return Err(ConfigError::Invalid(format!(
                "control and stream listeners share {}",
                self.control_addr
            )));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ServerConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}: {value:?} is not a socket address")))
}

fn parse_source(value: &str) -> Result<SourceDescriptor, ConfigError> {
    SourceDescriptor::parse(value).map_err(|e| ConfigError::Invalid(e.to_string()))
}

fn parse_log_level(value: &str) -> Result<LevelFilter, ConfigError> {
    parse_level(value).ok_or_else(|| ConfigError::Invalid(format!("unknown log level {value:?}")))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
