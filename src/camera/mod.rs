//! Camera collaborators
//!
//! Two ffmpeg-backed pieces sit around the [`FrameMailbox`](crate::broadcast::FrameMailbox):
//!
//! ```text
//!   /dev/video0 ──► MjpegCapture ──► FrameMailbox ──┬──► live viewers
//!                                                   └──► H264Encoder ──► segment.h264
//! ```
//!
//! [`MjpegCapture`] owns the device and publishes JPEG frames. [`H264Encoder`]
//! is the [`RecordingEncoder`](crate::recorder::RecordingEncoder) the segment
//! recorder rotates between files.

pub mod capture;
pub mod h264;
pub mod mjpeg;

pub use capture::{CaptureConfig, MjpegCapture};
pub use h264::H264Encoder;
pub use mjpeg::JpegSplitter;
