//! Rotating segment recorder
//!
//! Splits continuous camera output into fixed-length segments. Each closed
//! segment is handed to a [`Converter`](crate::convert::Converter); on success
//! the raw file is deleted, on failure it is kept for manual recovery.
//!
//! # State machine
//!
//! ```text
//!            start()             interval elapsed
//!   Idle ───────────────► Recording ─────────────► Rotating
//!     │                     │   ▲                     │
//!     │ encoder fails       │   └─────────────────────┘
//!     ▼                     │ signal_stop()     encoder re-armed
//!   Failed ◄────────────────┤
//!          encoder fails    ▼
//!                        Stopped
//! ```
//!
//! # Example
//!
//! ```ignore
//! use picam_rs::recorder::{RecorderConfig, SegmentRecorder};
//! use picam_rs::convert::FfmpegConverter;
//!
//! let config = RecorderConfig::new("recordings");
//! let mut recorder = SegmentRecorder::new(config, encoder, FfmpegConverter::new());
//! recorder.start().await?;
//! // ...
//! recorder.signal_stop();
//! let state = recorder.await_termination(Duration::from_secs(10)).await;
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod segment;
pub mod state;
pub mod worker;

pub use config::RecorderConfig;
pub use encoder::{EncoderError, RecordingEncoder};
pub use error::RecorderError;
pub use segment::{Segment, SegmentClock, SegmentState, SEGMENT_NAME_FORMAT};
pub use state::{RecorderState, RecorderStats};
pub use worker::SegmentRecorder;
