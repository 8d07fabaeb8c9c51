//! Segment conversion
//!
//! A [`Converter`] turns a closed raw segment into a playable container next
//! to it. Converters never delete their input: the segment recorder removes
//! the raw file only after the converter reports success and the container
//! exists on disk.

pub mod ffmpeg;

pub use ffmpeg::FfmpegConverter;

use std::future::Future;
use std::path::{Path, PathBuf};

/// Error returned by a [`Converter`]
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The converter process could not be started
    #[error("failed to launch converter: {0}")]
    Launch(#[source] std::io::Error),

    /// The converter ran and reported failure
    #[error("conversion of {path} failed: {reason}")]
    Failed { path: PathBuf, reason: String },

    /// The converter reported success but produced no output file
    #[error("converter reported success but {0} does not exist")]
    MissingOutput(PathBuf),

    /// Filesystem error around the conversion
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts a raw segment into a playable container
///
/// Implementations must invoke external tools with an argument vector,
/// never through a shell.
pub trait Converter: Send + Sync + 'static {
    /// Convert `raw`, returning the path of the container file
    fn convert(&self, raw: &Path)
        -> impl Future<Output = Result<PathBuf, ConversionError>> + Send;
}
