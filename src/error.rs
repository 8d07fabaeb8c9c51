//! Crate-level error type

use crate::config::ConfigError;
use crate::convert::ConversionError;
use crate::recorder::{EncoderError, RecorderError};

/// Result alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for camera server operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (bind, accept, filesystem)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Segment recorder failure
    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Capture or recording encoder failure
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Segment conversion failure
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A global tracing subscriber was already installed
    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
