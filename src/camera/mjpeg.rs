//! MJPEG byte stream splitter
//!
//! An MJPEG stream from ffmpeg is a plain concatenation of JPEG images. Each
//! image starts with the SOI marker and ends with the EOI marker:
//!
//! ```text
//! FF D8 ....................... FF D9 FF D8 ........ FF D9
//! └──────────── frame ────────────┘ └─────── frame ──────┘
//! ```
//!
//! Bytes arrive in arbitrary chunks, so markers may straddle reads.

use bytes::{Buf, Bytes, BytesMut};

/// Start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Default cap on a single frame (8MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Incremental JPEG frame extractor
#[derive(Debug)]
pub struct JpegSplitter {
    buf: BytesMut,
    max_frame_size: usize,
    discarded: u64,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Splitter that drops any frame growing past `max` bytes
    pub fn with_max_frame_size(max: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(64 * 1024),
            max_frame_size: max,
            discarded: 0,
        }
    }

    /// Append bytes read from the stream
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            // Drop anything before the start marker
            match find(&self.buf, &SOI, 0) {
                Some(0) => {}
                Some(start) => {
                    self.buf.advance(start);
                    self.discarded += 1;
                }
                None => {
                    // Keep a trailing 0xFF that may begin a marker
                    let keep = usize::from(self.buf.last() == Some(&0xFF));
                    let drop = self.buf.len() - keep;
                    if drop > 0 {
                        self.buf.advance(drop);
                    }
                    return None;
                }
            }

            match find(&self.buf, &EOI, SOI.len()) {
                Some(end) => {
                    let frame = self.buf.split_to(end + EOI.len());
                    return Some(frame.freeze());
                }
                None if self.buf.len() > self.max_frame_size => {
                    tracing::warn!(
                        buffered = self.buf.len(),
                        max = self.max_frame_size,
                        "Oversized JPEG frame dropped"
                    );
                    // Skip past this SOI and resync on the next one
                    self.buf.advance(SOI.len());
                    self.discarded += 1;
                }
                None => return None,
            }
        }
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Number of resyncs (garbage or oversized frames skipped)
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for JpegSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    if haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(body);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_single_frame() {
        let mut splitter = JpegSplitter::new();
        splitter.push(&jpeg(b"abc"));

        assert_eq!(splitter.next_frame().unwrap(), Bytes::from(jpeg(b"abc")));
        assert!(splitter.next_frame().is_none());
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_frames_in_one_chunk() {
        let mut data = jpeg(b"one");
        data.extend(jpeg(b"two"));

        let mut splitter = JpegSplitter::new();
        splitter.push(&data);

        assert_eq!(splitter.next_frame().unwrap(), Bytes::from(jpeg(b"one")));
        assert_eq!(splitter.next_frame().unwrap(), Bytes::from(jpeg(b"two")));
        assert!(splitter.next_frame().is_none());
    }

    #[test]
    fn test_markers_split_across_reads() {
        let data = jpeg(b"payload");
        let mut splitter = JpegSplitter::new();

        // Feed one byte at a time so both markers straddle pushes
        let mut frames = Vec::new();
        for b in &data {
            splitter.push(std::slice::from_ref(b));
            if let Some(frame) = splitter.next_frame() {
                frames.push(frame);
            }
        }

        assert_eq!(frames, vec![Bytes::from(data)]);
    }

    #[test]
    fn test_leading_garbage_skipped() {
        let mut data = b"\x00\x01junk".to_vec();
        data.extend(jpeg(b"x"));

        let mut splitter = JpegSplitter::new();
        splitter.push(&data);

        assert_eq!(splitter.next_frame().unwrap(), Bytes::from(jpeg(b"x")));
        assert_eq!(splitter.discarded(), 1);
    }

    #[test]
    fn test_garbage_without_marker_not_retained() {
        let mut splitter = JpegSplitter::new();
        splitter.push(&[0u8; 1000]);

        assert!(splitter.next_frame().is_none());
        assert_eq!(splitter.buffered(), 0);
    }

    #[test]
    fn test_oversized_frame_dropped() {
        let mut splitter = JpegSplitter::with_max_frame_size(16);
        let mut big = SOI.to_vec();
        big.extend_from_slice(&[0u8; 32]);
        splitter.push(&big);

        assert!(splitter.next_frame().is_none());
        assert!(splitter.discarded() >= 1);

        // Resyncs on the next good frame
        splitter.push(&jpeg(b"ok"));
        assert_eq!(splitter.next_frame().unwrap(), Bytes::from(jpeg(b"ok")));
    }
}
