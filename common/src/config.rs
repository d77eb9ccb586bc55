use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// MJPEG stream URL or still-image URL, depending on `mode`.
    pub url: String,
    #[serde(default)]
    pub mode: CaptureMode,
    /// Sensor control endpoint. Settings are only pushed when this is set.
    #[serde(default)]
    pub control_url: Option<String>,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// How a single frame is pulled from the camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Take the first complete part of a `multipart/x-mixed-replace` stream.
    #[default]
    Mjpeg,
    /// Fetch one still image per request.
    Snapshot,
}

/// Sensor frame sizes, named and numbered as the camera's control endpoint expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSize {
    Qqvga,
    Qcif,
    Hqvga,
    Qvga,
    Cif,
    Hvga,
    Vga,
    /// 800x600
    #[default]
    Svga,
    Xga,
    Hd,
    Sxga,
    Uxga,
}

impl FrameSize {
    pub fn index(self) -> i32 {
        match self {
            FrameSize::Qqvga => 1,
            FrameSize::Qcif => 2,
            FrameSize::Hqvga => 3,
            FrameSize::Qvga => 5,
            FrameSize::Cif => 6,
            FrameSize::Hvga => 7,
            FrameSize::Vga => 8,
            FrameSize::Svga => 9,
            FrameSize::Xga => 10,
            FrameSize::Hd => 11,
            FrameSize::Sxga => 12,
            FrameSize::Uxga => 13,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub frame_size: FrameSize,
    /// Lower is better quality (0..=63).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub white_balance: bool,
    #[serde(default)]
    pub awb_gain: bool,
    #[serde(default)]
    pub exposure_ctrl: bool,
    #[serde(default)]
    pub gain_ctrl: bool,
    #[serde(default)]
    pub brightness: i8,
    #[serde(default = "default_contrast")]
    pub contrast: i8,
    #[serde(default)]
    pub saturation: i8,
    #[serde(default = "default_sharpness")]
    pub sharpness: i8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::default(),
            jpeg_quality: default_jpeg_quality(),
            white_balance: false,
            awb_gain: false,
            exposure_ctrl: false,
            gain_ctrl: false,
            brightness: 0,
            contrast: default_contrast(),
            saturation: 0,
            sharpness: default_sharpness(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Mount point of the storage volume.
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensor = &self.camera.sensor;
        if sensor.jpeg_quality > 63 {
            return Err(ConfigError::Invalid(format!(
                "camera.sensor.jpeg_quality must be 0..=63, got {}",
                sensor.jpeg_quality
            )));
        }
        for (name, value) in [
            ("brightness", sensor.brightness),
            ("contrast", sensor.contrast),
            ("saturation", sensor.saturation),
            ("sharpness", sensor.sharpness),
        ] {
            if !(-2..=2).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "camera.sensor.{name} must be -2..=2, got {value}"
                )));
            }
        }
        if self.network.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "network.connect_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_jpeg_quality() -> u8 {
    10
}
fn default_contrast() -> i8 {
    1
}
fn default_sharpness() -> i8 {
    1
}
fn default_connect_attempts() -> u32 {
    20
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    80
}
fn default_log_level() -> String {
    "info".into()
}
