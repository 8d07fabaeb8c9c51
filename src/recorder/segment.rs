//! Recording segments
//!
//! A segment is one rotation interval of raw encoder output. Its filename is
//! the local time it started at, formatted so lexicographic order matches
//! chronological order:
//!
//! ```text
//! 2024-05-01_13-45-09.h264   (Recording / PendingConversion / ConversionFailed)
//! 2024-05-01_13-45-09.mp4    (Converted)
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::store::{CONTAINER_EXTENSION, RAW_EXTENSION};

/// `strftime` pattern for segment filename stems
pub const SEGMENT_NAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Lifecycle of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Receiving encoder output
    Recording,
    /// Closed, not yet playable
    PendingConversion,
    /// Raw file deleted, container present
    Converted,
    /// Raw file kept, no container
    ConversionFailed,
}

/// Source of segment start times
///
/// Wall-clock origin plus monotonic elapsed time, so successive segment names
/// keep increasing even if the system clock is stepped backwards.
#[derive(Debug, Clone)]
pub struct SegmentClock {
    wall: DateTime<Local>,
    mono: Instant,
}

impl SegmentClock {
    /// Anchor the clock at the current time
    pub fn new() -> Self {
        Self::anchored_at(Local::now())
    }

    /// Anchor the clock at a given wall-clock time
    pub fn anchored_at(wall: DateTime<Local>) -> Self {
        Self {
            wall,
            mono: Instant::now(),
        }
    }

    /// Current local time according to this clock
    pub fn now(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall + elapsed
    }
}

impl Default for SegmentClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Filename stem for a segment started at `at`
pub fn segment_stem(at: &DateTime<Local>) -> String {
    at.format(SEGMENT_NAME_FORMAT).to_string()
}

/// A recording segment
#[derive(Debug, Clone)]
pub struct Segment {
    /// Local time recording into this segment began
    pub started_at: DateTime<Local>,

    /// Path of the raw encoder output
    pub raw_path: PathBuf,

    /// Current lifecycle state
    pub state: SegmentState,

    /// Monotonic start, for rotation timing
    started: Instant,
}

impl Segment {
    /// Allocate the next segment in `dir`
    ///
    /// Does not create the file; the encoder does when it starts. If the
    /// timestamp stem is already used by a raw or converted file, a `-N`
    /// suffix keeps the name unique.
    pub async fn open(dir: &Path, clock: &SegmentClock) -> io::Result<Self> {
        let started_at = clock.now();
        let stem = segment_stem(&started_at);

        let mut candidate = stem.clone();
        let mut suffix = 0u32;
        loop {
            let raw = dir.join(format!("{}.{}", candidate, RAW_EXTENSION));
            let container = dir.join(format!("{}.{}", candidate, CONTAINER_EXTENSION));

            if !tokio::fs::try_exists(&raw).await? && !tokio::fs::try_exists(&container).await? {
                return Ok(Self {
                    started_at,
                    raw_path: raw,
                    state: SegmentState::Recording,
                    started: Instant::now(),
                });
            }

            suffix += 1;
            candidate = format!("{}-{}", stem, suffix);
        }
    }

    /// Filename of the raw segment
    pub fn name(&self) -> String {
        self.raw_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path the converted container will have
    pub fn container_path(&self) -> PathBuf {
        self.raw_path.with_extension(CONTAINER_EXTENSION)
    }

    /// Time spent recording into this segment
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
