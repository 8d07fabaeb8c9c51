//! Recorder error types

use super::encoder::EncoderError;

/// Error type for segment recorder operations
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// `start` was called on a recorder that already ran
    #[error("recorder already started")]
    AlreadyStarted,

    /// The encoder failed; recording cannot continue
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Filesystem error while opening a segment
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
