//! Camera context
//!
//! Owns every long-lived component of a running camera and tears them down
//! in a fixed order:
//!
//! ```text
//! start:     mailbox ──► capture ──► recorder
//! shutdown:  recorder stop ──► await recorder (bounded) ──► close mailbox ──► stop capture
//! ```
//!
//! The recorder is stopped first so its encoder finalizes the last segment
//! while frames are still flowing. Closing the mailbox then releases every
//! live viewer before the capture process is killed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::broadcast::FrameMailbox;
use crate::camera::{H264Encoder, MjpegCapture};
use crate::config::CamConfig;
use crate::convert::FfmpegConverter;
use crate::error::Result;
use crate::recorder::{EncoderError, RecorderState, RecorderStats, SegmentRecorder};
use crate::server::{AppState, Pages};
use crate::store::RecordingStore;

/// Recorder type used by the camera binary
pub type CameraRecorder = SegmentRecorder<H264Encoder, FfmpegConverter>;

/// Running camera components
pub struct CameraContext {
    mailbox: Arc<FrameMailbox>,
    capture: MjpegCapture,
    recorder: CameraRecorder,
    store: RecordingStore,
    pages: Pages,
}

impl CameraContext {
    /// Start capture and recording
    pub async fn start(config: &CamConfig) -> Result<Self> {
        let mailbox = Arc::new(FrameMailbox::new());
        let capture_config = config.capture();
        let mut capture = MjpegCapture::spawn(&capture_config, Arc::clone(&mailbox))?;

        let encoder = H264Encoder::new(Arc::clone(&mailbox))
            .program(&config.capture.ffmpeg)
            .framerate(config.framerate);
        let converter = FfmpegConverter::with_program(&config.capture.ffmpeg).framerate(config.framerate);
        let mut recorder = SegmentRecorder::new(config.recorder(), encoder, converter);

        if let Err(e) = recorder.start().await {
            mailbox.close();
            if let Err(stop_err) = capture.stop(Duration::from_secs(2)).await {
                tracing::warn!(error = %stop_err, "Capture stop failed");
            }
            return Err(e.into());
        }

        Ok(Self {
            mailbox,
            capture,
            recorder,
            store: RecordingStore::new(&config.recordings_dir),
            pages: Pages::new(config.video_width, config.video_height),
        })
    }

    /// State for the HTTP handlers
    pub fn app_state(&self) -> AppState {
        AppState::new(Arc::clone(&self.mailbox), self.store.clone(), self.pages.clone())
    }

    /// The live frame mailbox
    pub fn mailbox(&self) -> &Arc<FrameMailbox> {
        &self.mailbox
    }

    /// Observe recorder state changes
    pub fn recorder_state(&self) -> watch::Receiver<RecorderState> {
        self.recorder.state_watch()
    }

    /// Recorder counters
    pub fn recorder_stats(&self) -> &Arc<RecorderStats> {
        self.recorder.stats()
    }

    /// Resolve when the capture process ends on its own
    pub async fn capture_exited(&mut self) -> std::result::Result<(), EncoderError> {
        self.capture.wait().await
    }

    /// Stop everything, waiting up to `timeout` for the recorder
    ///
    /// Returns the state the recorder reached. A recorder that does not stop
    /// in time is logged and abandoned; its raw segment stays on disk.
    pub async fn shutdown(mut self, timeout: Duration) -> RecorderState {
        tracing::info!(timeout_secs = timeout.as_secs(), "Shutting down camera");

        self.recorder.signal_stop();
        let state = self.recorder.await_termination(timeout).await;

        self.mailbox.close();

        if let Err(e) = self.capture.stop(timeout).await {
            tracing::warn!(error = %e, "Capture did not stop cleanly");
        }

        let stats = self.recorder.stats();
        tracing::info!(
            state = %state,
            segments = stats.segments_started(),
            converted = stats.segments_converted(),
            failed = stats.conversion_failures(),
            "Camera stopped"
        );
        state
    }
}
