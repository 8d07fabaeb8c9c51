//! Segment recorder configuration

use std::path::PathBuf;
use std::time::Duration;

/// Segment recorder configuration options
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory segments and converted recordings are written to
    pub output_dir: PathBuf,

    /// How long each segment records before rotation
    pub rotation_interval: Duration,

    /// How often the worker checks whether rotation is due
    pub poll_interval: Duration,

    /// Convert the final segment when recording stops
    pub convert_on_stop: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            rotation_interval: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            convert_on_stop: true,
        }
    }
}

impl RecorderConfig {
    /// Create a new config writing to `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the rotation interval
    ///
    /// The poll interval is clamped so it never exceeds the rotation interval.
    pub fn rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self.poll_interval = self.poll_interval.min(interval);
        self
    }

    /// Set the poll interval (capped at the rotation interval)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.min(self.rotation_interval);
        self
    }

    /// Choose whether the final segment is converted on stop
    pub fn convert_on_stop(mut self, convert: bool) -> Self {
        self.convert_on_stop = convert;
        self
    }
}
