//! Recording encoder seam
//!
//! The camera's recording encoder is an external collaborator. The segment
//! recorder only needs to point it at a new output file and to start and stop
//! it; everything else about capture and encoding stays behind this trait.

use std::future::Future;
use std::path::Path;

/// Error type for encoder operations
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// The encoder could not be launched
    #[error("failed to launch encoder: {0}")]
    Launch(#[source] std::io::Error),

    /// The encoder exited abnormally
    #[error("encoder exited: {0}")]
    Exited(String),

    /// `start` while already running
    #[error("encoder already running")]
    AlreadyRunning,

    /// IO error talking to the encoder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An encoder whose output can be redirected between segment files
///
/// The segment recorder owns the encoder exclusively while it runs; no other
/// component attaches a sink concurrently.
pub trait RecordingEncoder: Send + 'static {
    /// Attach `output` as the sink and begin encoding into it
    fn start(&mut self, output: &Path) -> impl Future<Output = Result<(), EncoderError>> + Send;

    /// Stop encoding and finalize the current output file
    ///
    /// When this resolves the file is complete on disk.
    fn stop(&mut self) -> impl Future<Output = Result<(), EncoderError>> + Send;
}
