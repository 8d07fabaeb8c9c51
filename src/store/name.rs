//! Recording filename validation
//!
//! Every filename taken from a request passes through [`RecordingName::parse`]
//! before it is joined onto the recordings directory. The pattern admits only
//! `[-_A-Za-z0-9]` in the stem and one known extension, which rules out `/`
//! and `..` entirely.

use once_cell::sync::Lazy;
use regex::Regex;

/// Extension of segments still in the encoder's native format
pub const RAW_EXTENSION: &str = "h264";

/// Extension of converted, browser-playable recordings
pub const CONTAINER_EXTENSION: &str = "mp4";

// Must never admit '.' or '/' in the stem.
static RECORDING_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-_A-Za-z0-9]+\.(mp4|h264)$").expect("recording name pattern is valid")
});

/// What a recording file is good for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingKind {
    /// Converted container, servable for playback
    Playable,
    /// Raw segment: recording, awaiting conversion, or failed conversion
    Pending,
}

impl RecordingKind {
    /// File extension for this kind
    pub fn extension(self) -> &'static str {
        match self {
            RecordingKind::Playable => CONTAINER_EXTENSION,
            RecordingKind::Pending => RAW_EXTENSION,
        }
    }
}

/// A validated recording filename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingName {
    name: String,
    kind: RecordingKind,
}

impl RecordingName {
    /// Validate a bare filename
    ///
    /// Returns `None` for anything that is not `stem.mp4` or `stem.h264`
    /// with a stem drawn from `[-_A-Za-z0-9]`.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = RECORDING_NAME_PATTERN.captures(name)?;
        let kind = match caps.get(1)?.as_str() {
            CONTAINER_EXTENSION => RecordingKind::Playable,
            _ => RecordingKind::Pending,
        };

        Some(Self {
            name: name.to_owned(),
            kind,
        })
    }

    /// The filename
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Whether this names a playable container or a raw segment
    pub fn kind(&self) -> RecordingKind {
        self.kind
    }

    /// Whether the file may be served for playback
    pub fn is_playable(&self) -> bool {
        self.kind == RecordingKind::Playable
    }
}

impl std::fmt::Display for RecordingName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
