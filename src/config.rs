//! Process configuration
//!
//! Loaded from a TOML file. Every key is optional:
//!
//! ```toml
//! port = 8000
//! video_width = 640
//! video_height = 480
//! framerate = 24
//! recording_interval = 60   # seconds per segment
//! poll_interval = 5         # seconds between rotation checks
//! recordings_dir = "recordings"
//! info_log = "logs/info.log"
//! error_log = "logs/error.log"
//! shutdown_timeout = 10
//! convert_on_stop = true
//!
//! [capture]
//! ffmpeg = "ffmpeg"
//! input_format = "v4l2"
//! device = "/dev/video0"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::CaptureConfig;
use crate::recorder::RecorderConfig;
use crate::server::ServerConfig;

/// Error loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    /// ffmpeg executable used for capture, recording and conversion
    pub ffmpeg: PathBuf,
    /// ffmpeg input format for the device
    pub input_format: String,
    /// Capture device
    pub device: String,
}

impl Default for CaptureSection {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            ffmpeg: capture.ffmpeg,
            input_format: capture.input_format,
            device: capture.device,
        }
    }
}

/// Camera server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamConfig {
    /// HTTP port
    pub port: u16,
    /// Address to bind
    pub bind_ip: IpAddr,
    /// Capture width in pixels
    pub video_width: u32,
    /// Capture height in pixels
    pub video_height: u32,
    /// Capture frame rate
    pub framerate: u32,
    /// Segment length in seconds
    pub recording_interval: u64,
    /// Rotation check period in seconds
    pub poll_interval: u64,
    /// Directory for segments and converted recordings
    pub recordings_dir: PathBuf,
    /// File receiving INFO and above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_log: Option<PathBuf>,
    /// File receiving ERROR only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<PathBuf>,
    /// Seconds to wait for the recorder on shutdown
    pub shutdown_timeout: u64,
    /// Convert the final segment when stopping
    pub convert_on_stop: bool,
    /// Maximum concurrent HTTP connections (0 = unlimited)
    pub max_connections: usize,
    /// Capture device settings
    pub capture: CaptureSection,
}

impl Default for CamConfig {
    fn default() -> Self {
        let recorder = RecorderConfig::default();
        Self {
            port: crate::server::config::DEFAULT_PORT,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            video_width: 640,
            video_height: 480,
            framerate: 24,
            recording_interval: recorder.rotation_interval.as_secs(),
            poll_interval: recorder.poll_interval.as_secs(),
            recordings_dir: recorder.output_dir,
            info_log: None,
            error_log: None,
            shutdown_timeout: 10,
            convert_on_stop: recorder.convert_on_stop,
            max_connections: 0,
            capture: CaptureSection::default(),
        }
    }
}

impl CamConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load `path`, or `None` if it does not exist
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the recorder and capture cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.video_width == 0 || self.video_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "video size {}x{} must be non-zero",
                self.video_width, self.video_height
            )));
        }
        if self.framerate == 0 {
            return Err(ConfigError::Invalid("framerate must be non-zero".into()));
        }
        if self.recording_interval == 0 || self.poll_interval == 0 {
            return Err(ConfigError::Invalid(
                "recording_interval and poll_interval must be non-zero".into(),
            ));
        }
        if self.poll_interval >= self.recording_interval {
            return Err(ConfigError::Invalid(format!(
                "poll_interval ({}s) must be shorter than recording_interval ({}s)",
                self.poll_interval, self.recording_interval
            )));
        }
        Ok(())
    }

    /// HTTP server settings
    pub fn server(&self) -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::new(self.bind_ip, self.port))
            .max_connections(self.max_connections)
    }

    /// Segment recorder settings
    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig::new(&self.recordings_dir)
            .rotation_interval(Duration::from_secs(self.recording_interval))
            .poll_interval(Duration::from_secs(self.poll_interval))
            .convert_on_stop(self.convert_on_stop)
    }

    /// Capture process settings
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            ffmpeg: self.capture.ffmpeg.clone(),
            input_format: self.capture.input_format.clone(),
            ..CaptureConfig::default()
        }
        .device(self.capture.device.clone())
        .resolution(self.video_width, self.video_height)
        .framerate(self.framerate)
    }

    /// Recorder join timeout on shutdown
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CamConfig::default();

        assert_eq!(config.port, 8000);
        assert_eq!(config.recording_interval, 60);
        assert_eq!(config.poll_interval, 5);
        assert_eq!(config.recordings_dir, PathBuf::from("recordings"));
        assert!(config.convert_on_stop);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file() {
        let config = CamConfig::from_toml(
            r#"
            port = 9090
            video_width = 1280
            video_height = 720
            recordings_dir = "/var/picam"

            [capture]
            device = "/dev/video2"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.recording_interval, 60);
        assert_eq!(config.capture.device, "/dev/video2");
        assert_eq!(config.capture.input_format, "v4l2");

        let capture = config.capture();
        assert_eq!((capture.width, capture.height), (1280, 720));
        assert_eq!(capture.device, "/dev/video2");

        assert_eq!(config.server().bind_addr.port(), 9090);
        assert_eq!(config.recorder().output_dir, PathBuf::from("/var/picam"));
    }

    #[test]
    fn test_recorder_intervals() {
        let config = CamConfig::from_toml("recording_interval = 120\npoll_interval = 2").unwrap();
        let recorder = config.recorder();

        assert_eq!(recorder.rotation_interval, Duration::from_secs(120));
        assert_eq!(recorder.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_invalid() {
        for text in [
            "video_width = 0",
            "framerate = 0",
            "recording_interval = 0",
            "recording_interval = 5\npoll_interval = 5",
        ] {
            let err = CamConfig::from_toml(text).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}", text);
        }
    }

    #[test]
    fn test_rejects_malformed() {
        let err = CamConfig::from_toml("port = \"eighty\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let config = CamConfig::load_optional(&dir.path().join("absent.toml")).unwrap();
        assert!(config.is_none());

        let path = dir.path().join("picam.toml");
        std::fs::write(&path, "port = 9000\n").unwrap();
        let config = CamConfig::load_optional(&path).unwrap().unwrap();
        assert_eq!(config.port, 9000);

        std::fs::write(&path, "port = \"eighty\"").unwrap();
        assert!(CamConfig::load_optional(&path).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CamConfig::default();
        config.error_log = Some(PathBuf::from("logs/error.log"));

        let text = config.to_toml().unwrap();
        assert!(text.contains("[capture]"));
        assert_eq!(CamConfig::from_toml(&text).unwrap(), config);
    }
}
