//! Frame type shared between the capture task and live viewers

use bytes::Bytes;

/// An encoded frame as seen by a subscriber
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Mailbox generation at which this frame was published (starts at 1)
    pub sequence: u64,
    /// Encoded payload (a complete JPEG image for the live stream)
    pub data: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(sequence: u64, data: Bytes) -> Self {
        Self { sequence, data }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
